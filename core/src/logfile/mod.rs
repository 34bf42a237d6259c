//! Recorded monitor logs
//!
//! A log is one monitor message per line, each optionally preceded by draw
//! command groups (see [`draw`]). Three readers trade memory against seek cost:
//!
//! - [`SequentialReader`] - one forward stream; stepping back reopens the log
//! - [`WindowedReader`] - sequential reader plus the last N lines in memory
//! - [`RandomAccessReader`] - byte offset of every line; plain files only
//!
//! All readers work on frame ordinals starting at 0. The frame count is an
//! estimate until the end of the log has been seen.

use std::path::{Path, PathBuf};

pub mod archive;
pub mod draw;
mod random_access;
mod sequential;
mod windowed;

pub use archive::{
    ArchiveKind, DEFAULT_TAR_ENTRY_SUFFIX, create_encoded_writer, open_decoded_stream,
    open_decoded_stream_with,
};
pub use draw::{DrawCommandSink, LogHooks, LogfileListener};
pub use random_access::RandomAccessReader;
pub use sequential::SequentialReader;
pub use windowed::WindowedReader;

/// Frame count assumed until the end of a log is known.
pub const DEFAULT_FRAME_ESTIMATE: usize = 1700;

/// Lines kept by a [`WindowedReader`] unless configured otherwise.
pub const DEFAULT_WINDOW_SIZE: usize = 200;

/// Errors from opening or reading a log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported log archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("no entry ending with '{suffix}' in {path}")]
    EntryNotFound { path: PathBuf, suffix: String },

    #[error("{0} is compressed and cannot be read at random positions")]
    NotSeekable(PathBuf),

    #[error("log is closed")]
    Closed,
}

/// Frame-addressed access to a log.
///
/// The reader is always positioned on a frame. `current_message` is `None`
/// only for an empty or closed log.
pub trait LogReader: Send {
    /// Whether the log was opened and has not been closed.
    fn is_valid(&self) -> bool;

    fn path(&self) -> &Path;

    fn current_frame(&self) -> usize;

    fn current_message(&self) -> Option<&str>;

    /// Estimated number of frames; exact once the end has been reached.
    fn frame_count(&self) -> usize;

    /// Override the estimate, e.g. with the count found by a full scan.
    fn set_frame_count(&mut self, frame_count: usize);

    fn is_at_beginning(&self) -> bool {
        self.current_frame() == 0
    }

    /// Whether the current frame is the last one in the log.
    fn is_at_end(&self) -> bool;

    /// Advance one frame. Returns the new message, or `None` at the end.
    fn step_forward(&mut self) -> Result<Option<&str>, LogError>;

    /// Go back one frame; no-op at the beginning.
    fn step_backward(&mut self) -> Result<(), LogError>;

    /// Position on `frame`, or on the last frame if the log is shorter.
    fn seek(&mut self, frame: usize) -> Result<(), LogError>;

    /// Return to frame 0.
    fn rewind(&mut self) -> Result<(), LogError>;

    /// Release the underlying file. The reader is invalid afterwards.
    fn close(&mut self);
}

/// How to open a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStrategy {
    Sequential,
    /// Sequential reader with a window of this many lines
    Windowed(usize),
    RandomAccess,
    /// Random access for plain files, a window of this size for archives
    Auto(usize),
}

impl Default for LogStrategy {
    fn default() -> Self {
        LogStrategy::Auto(DEFAULT_WINDOW_SIZE)
    }
}

/// Settings shared by all readers.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub tar_entry_suffix: String,
    pub initial_frame_estimate: usize,
    pub hooks: LogHooks,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            tar_entry_suffix: DEFAULT_TAR_ENTRY_SUFFIX.to_string(),
            initial_frame_estimate: DEFAULT_FRAME_ESTIMATE,
            hooks: LogHooks::default(),
        }
    }
}

impl LogOptions {
    pub fn with_hooks(mut self, hooks: LogHooks) -> Self {
        self.hooks = hooks;
        self
    }
}

/// Open a log with the given strategy.
pub fn open_log(
    path: &Path,
    strategy: LogStrategy,
    options: &LogOptions,
) -> Result<Box<dyn LogReader>, LogError> {
    let plain = ArchiveKind::detect(path).is_plain();
    Ok(match strategy {
        LogStrategy::Sequential => Box::new(SequentialReader::open(path, options)?),
        LogStrategy::RandomAccess => Box::new(RandomAccessReader::open(path, options)?),
        LogStrategy::Auto(_) if plain => Box::new(RandomAccessReader::open(path, options)?),
        LogStrategy::Windowed(window) | LogStrategy::Auto(window) => Box::new(
            WindowedReader::new(SequentialReader::open(path, options)?, window),
        ),
    })
}

/// Read one raw line without its terminator. `Ok(None)` at end of stream.
pub(crate) fn read_raw_line<R: std::io::BufRead + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
