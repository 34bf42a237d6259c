//! Mirror recording of live sessions
//!
//! Every message received from the server is appended to a log in the same
//! format the readers consume: one message per line, preceded by the draw
//! command groups that arrived since the previous message.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::logfile::{DrawCommandSink, LogError, create_encoded_writer, draw::format_draw_group};

/// Prefix of recorded log file names.
pub const LOG_FILE_PREFIX: &str = "sparkview_log";

/// File name for a recording started at `time`.
pub fn log_file_name<Tz>(time: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.log", LOG_FILE_PREFIX, time.format("%Y-%m-%d_%H-%M-%S"))
}

/// Writes a monitor log.
pub struct LogRecorder {
    path: PathBuf,
    writer: Option<Box<dyn Write + Send>>,
    pending_draw_commands: String,
    messages_written: u64,
}

impl LogRecorder {
    /// Start a new timestamped log in `dir`, creating the directory if needed.
    pub fn create(dir: &Path) -> Result<Self, LogError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(chrono::Local::now()));
        Self::create_at(&path)
    }

    /// Start a log at `path`. A `.gz` or `.bz2` suffix compresses it.
    pub fn create_at(path: &Path) -> Result<Self, LogError> {
        let writer = create_encoded_writer(path)?;
        info!("Recording to new log file: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            pending_draw_commands: String::new(),
            messages_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn messages_written(&self) -> u64 {
        self.messages_written
    }

    /// Hold a draw command until the next message is written.
    pub fn buffer_draw_command(&mut self, bytes: &[u8]) {
        if self.writer.is_some() {
            self.pending_draw_commands.push_str(&format_draw_group(bytes));
        }
    }

    /// Append one message, preceded by any buffered draw commands.
    pub fn write_message(&mut self, message: &str) -> Result<(), LogError> {
        let writer = self.writer.as_mut().ok_or(LogError::Closed)?;
        writer.write_all(self.pending_draw_commands.as_bytes())?;
        self.pending_draw_commands.clear();
        writer.write_all(message.as_bytes())?;
        writer.write_all(b"\n")?;
        self.messages_written += 1;
        Ok(())
    }

    /// Flush and close the log. Further writes fail with [`LogError::Closed`].
    pub fn close(&mut self) -> Result<(), LogError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        self.pending_draw_commands.clear();
        writer.flush()?;
        debug!(
            "closed {} after {} messages",
            self.path.display(),
            self.messages_written
        );
        Ok(())
    }
}

impl DrawCommandSink for LogRecorder {
    fn execute(&mut self, bytes: &[u8]) {
        self.buffer_draw_command(bytes);
    }
}

impl Drop for LogRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("failed to close log {}: {}", self.path.display(), e);
        }
    }
}

impl std::fmt::Debug for LogRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRecorder")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("messages_written", &self.messages_written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logfile::{LogOptions, LogReader, SequentialReader};
    use chrono::TimeZone;

    #[test]
    fn test_file_name_from_timestamp() {
        let time = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(log_file_name(time), "sparkview_log_2024-03-09_14-05-07.log");
    }

    #[test]
    fn test_create_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logfiles");
        let recorder = LogRecorder::create(&logs).unwrap();

        assert!(recorder.path().starts_with(&logs));
        let name = recorder.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("sparkview_log_"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_draw_commands_precede_next_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.log");
        let mut recorder = LogRecorder::create_at(&path).unwrap();

        recorder.write_message("((time 0))(RSG 0 1)").unwrap();
        recorder.buffer_draw_command(&[1, 2, 0xfe]);
        recorder.execute(&[9]);
        recorder.write_message("((time 0.04))(RDS 0 1)").unwrap();
        recorder.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "((time 0))(RSG 0 1)\n[1,2,-2][9]((time 0.04))(RDS 0 1)\n"
        );
        assert_eq!(recorder.messages_written(), 2);
    }

    #[test]
    fn test_recording_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.log.gz");
        let mut recorder = LogRecorder::create_at(&path).unwrap();
        recorder.buffer_draw_command(&[3]);
        for i in 0..5 {
            recorder.write_message(&format!("((time {}))(RDS 0 1)", i)).unwrap();
        }
        drop(recorder);

        let mut reader = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        assert_eq!(reader.current_message(), Some("((time 0))(RDS 0 1)"));
        reader.seek(4).unwrap();
        assert_eq!(reader.current_message(), Some("((time 4))(RDS 0 1)"));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = LogRecorder::create_at(&dir.path().join("closed.log")).unwrap();
        recorder.close().unwrap();
        recorder.close().unwrap();
        assert!(!recorder.is_open());
        assert!(matches!(
            recorder.write_message("((time 1))(RSG 0 1)"),
            Err(LogError::Closed)
        ));
    }
}
