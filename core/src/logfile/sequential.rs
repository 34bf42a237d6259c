//! Forward-only log reader

use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::draw::{LogHooks, strip_draw_commands};
use super::{LogError, LogOptions, LogReader, open_decoded_stream_with, read_raw_line};

/// Reads a log as one decoded stream.
///
/// The line after the current one is read ahead, so the reader knows it is
/// on the last frame without stepping past it. Going backwards reopens the
/// log and replays it up to the target frame.
pub struct SequentialReader {
    path: PathBuf,
    tar_entry_suffix: String,
    hooks: LogHooks,
    stream: Option<Box<dyn BufRead + Send>>,
    line_buf: Vec<u8>,
    current: Option<String>,
    /// Raw next line; draw commands are processed when it becomes current
    next: Option<String>,
    current_frame: usize,
    frame_count: usize,
    lines_read: u64,
}

impl SequentialReader {
    /// Open a log and position on frame 0.
    pub fn open(path: &Path, options: &LogOptions) -> Result<Self, LogError> {
        let mut reader = Self {
            path: path.to_path_buf(),
            tar_entry_suffix: options.tar_entry_suffix.clone(),
            hooks: options.hooks.clone(),
            stream: None,
            line_buf: Vec::new(),
            current: None,
            next: None,
            current_frame: 0,
            frame_count: options.initial_frame_estimate,
            lines_read: 0,
        };
        reader.reopen()?;
        Ok(reader)
    }

    /// Lines read from the underlying stream since the reader was created.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    fn reopen(&mut self) -> Result<(), LogError> {
        self.stream = Some(open_decoded_stream_with(&self.path, &self.tar_entry_suffix)?);
        self.current_frame = 0;
        self.current = self.read_raw()?.map(|raw| self.process(&raw));
        self.next = self.read_raw()?;
        if self.next.is_none() {
            self.frame_count = usize::from(self.current.is_some());
        }
        debug!("opened log {}", self.path.display());
        Ok(())
    }

    fn read_raw(&mut self) -> Result<Option<String>, LogError> {
        let stream = self.stream.as_mut().ok_or(LogError::Closed)?;
        let line = read_raw_line(stream, &mut self.line_buf)?;
        if line.is_some() {
            self.lines_read += 1;
        }
        Ok(line)
    }

    fn process(&self, raw: &str) -> String {
        strip_draw_commands(raw, &self.hooks).to_string()
    }
}

impl LogReader for SequentialReader {
    fn is_valid(&self) -> bool {
        self.stream.is_some()
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
        self.frame_count
    }

    fn set_frame_count(&mut self, frame_count: usize) {
        self.frame_count = frame_count;
    }

    fn is_at_end(&self) -> bool {
        self.next.is_none()
    }

    fn step_forward(&mut self) -> Result<Option<&str>, LogError> {
        if self.stream.is_none() {
            return Err(LogError::Closed);
        }
        let Some(raw) = self.next.take() else {
            return Ok(None);
        };
        self.current = Some(self.process(&raw));
        self.current_frame += 1;
        self.next = self.read_raw()?;

        if self.next.is_none() {
            // estimate was too high
            self.frame_count = self.current_frame + 1;
        } else if self.current_frame >= self.frame_count {
            // estimate was too low
            self.frame_count += 1;
        }
        trace!("log frame {}", self.current_frame);
        Ok(self.current.as_deref())
    }

    fn step_backward(&mut self) -> Result<(), LogError> {
        if self.current_frame > 0 {
            self.seek(self.current_frame - 1)?;
        }
        Ok(())
    }

    fn seek(&mut self, frame: usize) -> Result<(), LogError> {
        if frame < self.current_frame {
            self.reopen()?;
        }
        while self.current_frame < frame {
            if self.step_forward()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn rewind(&mut self) -> Result<(), LogError> {
        self.reopen()
    }

    fn close(&mut self) {
        self.stream = None;
        self.current = None;
        self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{numbered_lines, write_log};

    #[test]
    fn test_steps_through_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log", &numbered_lines(3));
        let mut reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();

        assert!(reader.is_valid());
        assert!(reader.is_at_beginning());
        assert_eq!(reader.current_message(), Some("line 0"));
        assert_eq!(reader.step_forward().unwrap(), Some("line 1"));
        assert!(!reader.is_at_end());
        assert_eq!(reader.step_forward().unwrap(), Some("line 2"));
        assert!(reader.is_at_end());
        assert_eq!(reader.step_forward().unwrap(), None);
        assert_eq!(reader.current_frame(), 2);
        assert_eq!(reader.current_message(), Some("line 2"));
    }

    #[test]
    fn test_frame_estimate_shrinks_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log", &numbered_lines(10));
        let mut reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        assert_eq!(reader.frame_count(), 1700);

        reader.seek(100).unwrap();
        assert_eq!(reader.current_frame(), 9);
        assert_eq!(reader.frame_count(), 10);
    }

    #[test]
    fn test_frame_estimate_grows_past_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log", &numbered_lines(10));
        let options = LogOptions {
            initial_frame_estimate: 4,
            ..LogOptions::default()
        };
        let mut reader = SequentialReader::open(&path, &options).unwrap();

        reader.seek(4).unwrap();
        assert_eq!(reader.frame_count(), 5);
        reader.seek(6).unwrap();
        assert_eq!(reader.frame_count(), 7);
        reader.seek(9).unwrap();
        assert_eq!(reader.frame_count(), 10);
    }

    #[test]
    fn test_backward_reopens_and_replays() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log", &numbered_lines(5));
        let mut reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();

        reader.seek(3).unwrap();
        let before = reader.lines_read();
        reader.step_backward().unwrap();
        assert_eq!(reader.current_frame(), 2);
        assert_eq!(reader.current_message(), Some("line 2"));
        // reopen reads frames 0..=2 plus one line of lookahead
        assert_eq!(reader.lines_read() - before, 4);

        reader.rewind().unwrap();
        assert!(reader.is_at_beginning());
        assert_eq!(reader.current_message(), Some("line 0"));
    }

    #[test]
    fn test_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "empty.log", &[]);
        let mut reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        assert_eq!(reader.current_message(), None);
        assert!(reader.is_at_end());
        assert_eq!(reader.frame_count(), 0);
        assert_eq!(reader.step_forward().unwrap(), None);
    }

    #[test]
    fn test_closed_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log", &numbered_lines(2));
        let mut reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        reader.close();
        assert!(!reader.is_valid());
        assert!(matches!(reader.step_forward(), Err(LogError::Closed)));
    }

    #[test]
    fn test_compressed_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log.gz", &numbered_lines(3));
        let mut reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        reader.seek(2).unwrap();
        assert_eq!(reader.current_message(), Some("line 2"));
        reader.step_backward().unwrap();
        assert_eq!(reader.current_message(), Some("line 1"));
    }

    #[test]
    fn test_draw_commands_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(
            dir.path(),
            "game.log",
            &["[1,2]line 0".to_string(), "line 1".to_string()],
        );
        let reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        assert_eq!(reader.current_message(), Some("line 0"));
    }
}
