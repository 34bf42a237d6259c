//! Byte-offset indexed log reader

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::draw::{LogHooks, strip_draw_commands};
use super::{ArchiveKind, LogError, LogOptions, LogReader, read_raw_line};

/// Reads plain-text logs at arbitrary frames.
///
/// Opening scans the file once and records where every line starts. The
/// frame count is exact from then on.
pub struct RandomAccessReader {
    path: PathBuf,
    hooks: LogHooks,
    file: Option<BufReader<File>>,
    offsets: Vec<u64>,
    line_buf: Vec<u8>,
    current: Option<String>,
    current_frame: usize,
}

impl RandomAccessReader {
    /// Index and open a plain log.
    ///
    /// # Errors
    ///
    /// Compressed logs are rejected with [`LogError::NotSeekable`].
    pub fn open(path: &Path, options: &LogOptions) -> Result<Self, LogError> {
        if !ArchiveKind::detect(path).is_plain() {
            return Err(LogError::NotSeekable(path.to_path_buf()));
        }

        let offsets = index_lines(path)?;
        debug!("indexed {} frames in {}", offsets.len(), path.display());

        let mut reader = Self {
            path: path.to_path_buf(),
            hooks: options.hooks.clone(),
            file: Some(BufReader::new(File::open(path)?)),
            offsets,
            line_buf: Vec::new(),
            current: None,
            current_frame: 0,
        };
        reader.read_at(0)?;
        Ok(reader)
    }

    /// Byte offset of every frame.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    fn read_at(&mut self, frame: usize) -> Result<(), LogError> {
        let file = self.file.as_mut().ok_or(LogError::Closed)?;
        let Some(&offset) = self.offsets.get(frame) else {
            self.current = None;
            self.current_frame = 0;
            return Ok(());
        };
        file.seek(SeekFrom::Start(offset))?;
        self.read_next_line(frame)
    }

    fn read_next_line(&mut self, frame: usize) -> Result<(), LogError> {
        let file = self.file.as_mut().ok_or(LogError::Closed)?;
        let raw = read_raw_line(file, &mut self.line_buf)?;
        self.current = raw.map(|raw| strip_draw_commands(&raw, &self.hooks).to_string());
        self.current_frame = frame;
        Ok(())
    }

    fn last_frame(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

fn index_lines(path: &Path) -> Result<Vec<u64>, LogError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut offsets = Vec::with_capacity(500);
    let mut buf = Vec::new();
    let mut position = 0u64;
    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        offsets.push(position);
        position += read as u64;
    }
    Ok(offsets)
}

impl LogReader for RandomAccessReader {
    fn is_valid(&self) -> bool {
        self.file.is_some()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn current_frame(&self) -> usize {
        self.current_frame
    }

    fn current_message(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn frame_count(&self) -> usize {
        self.offsets.len()
    }

    /// The index is exact; outside estimates are ignored.
    fn set_frame_count(&mut self, _frame_count: usize) {}

    fn is_at_end(&self) -> bool {
        self.current_frame >= self.last_frame()
    }

    fn step_forward(&mut self) -> Result<Option<&str>, LogError> {
        if self.file.is_none() {
            return Err(LogError::Closed);
        }
        if self.is_at_end() {
            return Ok(None);
        }
        // the file is positioned right after the current line
        self.read_next_line(self.current_frame + 1)?;
        Ok(self.current.as_deref())
    }

    fn step_backward(&mut self) -> Result<(), LogError> {
        if self.current_frame > 0 {
            self.seek(self.current_frame - 1)?;
        }
        Ok(())
    }

    fn seek(&mut self, frame: usize) -> Result<(), LogError> {
        let frame = frame.min(self.last_frame());
        if frame == self.current_frame && self.current.is_some() {
            return Ok(());
        }
        self.read_at(frame)
    }

    fn rewind(&mut self) -> Result<(), LogError> {
        self.read_at(0)
    }

    fn close(&mut self) {
        self.file = None;
        self.current = None;
    }
}
