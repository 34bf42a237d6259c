//! Sequential reader with a sliding window of recent lines

use std::collections::VecDeque;
use std::path::Path;

use super::{LogError, LogReader, SequentialReader};

/// Keeps the last `capacity` messages read from a [`SequentialReader`].
///
/// Seeks inside the window are index arithmetic. Seeks before it rewind the
/// inner reader, seeks past it keep reading forward and evict the oldest
/// messages. `window_start + window.len() - 1` is always the highest frame
/// the inner reader has produced.
pub struct WindowedReader {
    inner: SequentialReader,
    capacity: usize,
    window: VecDeque<String>,
    window_start: usize,
    current_frame: usize,
}

impl WindowedReader {
    pub fn new(inner: SequentialReader, capacity: usize) -> Self {
        let mut reader = Self {
            inner,
            capacity: capacity.max(1),
            window: VecDeque::new(),
            window_start: 0,
            current_frame: 0,
        };
        reader.reset_window();
        reader
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames currently held in memory.
    pub fn window(&self) -> std::ops::Range<usize> {
        self.window_start..self.window_start + self.window.len()
    }

    /// Lines the inner reader has read from the underlying stream.
    pub fn lines_read(&self) -> u64 {
        self.inner.lines_read()
    }

    fn reset_window(&mut self) {
        self.window.clear();
        if let Some(message) = self.inner.current_message() {
            self.window.push_back(message.to_string());
        }
        self.window_start = self.inner.current_frame();
        self.current_frame = self.window_start;
    }

    fn highest_frame(&self) -> usize {
        (self.window_start + self.window.len()).saturating_sub(1)
    }

    fn read_next(&mut self) -> Result<bool, LogError> {
        let Some(message) = self.inner.step_forward()? else {
            return Ok(false);
        };
        self.window.push_back(message.to_string());
        if self.window.len() > self.capacity {
            self.window.pop_front();
            self.window_start += 1;
        }
        Ok(true)
    }
}

impl LogReader for WindowedReader {
    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }

    fn current_frame(&self) -> usize {
        self.current_frame
    }

    fn current_message(&self) -> Option<&str> {
        self.window
            .get(self.current_frame.checked_sub(self.window_start)?)
            .map(String::as_str)
    }

    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    fn set_frame_count(&mut self, frame_count: usize) {
        self.inner.set_frame_count(frame_count);
    }

    fn is_at_end(&self) -> bool {
        self.inner.is_at_end() && self.current_frame == self.highest_frame()
    }

    fn step_forward(&mut self) -> Result<Option<&str>, LogError> {
        if self.current_frame == self.highest_frame() && !self.read_next()? {
            return Ok(None);
        }
        self.current_frame += 1;
        Ok(self.current_message())
    }

    fn step_backward(&mut self) -> Result<(), LogError> {
        if self.current_frame > 0 {
            self.seek(self.current_frame - 1)?;
        }
        Ok(())
    }

    fn seek(&mut self, frame: usize) -> Result<(), LogError> {
        if frame < self.window_start {
            self.rewind()?;
            while self.current_frame < frame {
                if self.step_forward()?.is_none() {
                    break;
                }
            }
        } else if frame > self.highest_frame() {
            self.current_frame = self.highest_frame();
            while self.current_frame < frame {
                if self.step_forward()?.is_none() {
                    break;
                }
            }
        } else {
            self.current_frame = frame;
        }
        Ok(())
    }

    fn rewind(&mut self) -> Result<(), LogError> {
        self.inner.rewind()?;
        self.reset_window();
        Ok(())
    }

    fn close(&mut self) {
        self.inner.close();
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logfile::LogOptions;
    use crate::test_utils::{numbered_lines, write_log};

    fn open(lines: usize, capacity: usize) -> (tempfile::TempDir, WindowedReader) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log", &numbered_lines(lines));
        let inner = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        (dir, WindowedReader::new(inner, capacity))
    }

    #[test]
    fn test_window_slides_forward() {
        let (_dir, mut reader) = open(10, 3);
        for _ in 0..5 {
            reader.step_forward().unwrap();
        }
        assert_eq!(reader.current_frame(), 5);
        assert_eq!(reader.window(), 3..6);
        assert_eq!(reader.current_message(), Some("line 5"));
    }

    #[test]
    fn test_seek_inside_window_does_no_io() {
        let (_dir, mut reader) = open(20, 5);
        reader.seek(8).unwrap();
        let lines = reader.lines_read();

        reader.seek(5).unwrap();
        assert_eq!(reader.current_message(), Some("line 5"));
        reader.step_backward().unwrap();
        assert_eq!(reader.current_message(), Some("line 4"));
        reader.step_forward().unwrap();
        reader.step_forward().unwrap();
        assert_eq!(reader.current_message(), Some("line 6"));
        assert_eq!(reader.lines_read(), lines);
    }

    #[test]
    fn test_seek_before_window_rewinds() {
        let (_dir, mut reader) = open(20, 5);
        reader.seek(15).unwrap();
        assert_eq!(reader.window(), 11..16);

        reader.seek(2).unwrap();
        assert_eq!(reader.current_frame(), 2);
        assert_eq!(reader.current_message(), Some("line 2"));
        assert_eq!(reader.window(), 0..3);
    }

    #[test]
    fn test_seek_past_end_stops_at_last_frame() {
        let (_dir, mut reader) = open(6, 4);
        reader.seek(50).unwrap();
        assert_eq!(reader.current_frame(), 5);
        assert!(reader.is_at_end());
        assert_eq!(reader.frame_count(), 6);
        assert_eq!(reader.step_forward().unwrap(), None);

        reader.step_backward().unwrap();
        assert!(!reader.is_at_end());
    }

    #[test]
    fn test_messages_match_sequential_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "game.log", &numbered_lines(30));
        let mut sequential = SequentialReader::open(&path, &LogOptions::default()).unwrap();
        let mut windowed = WindowedReader::new(
            SequentialReader::open(&path, &LogOptions::default()).unwrap(),
            7,
        );

        for target in [12, 3, 29, 22, 0, 17, 16, 25] {
            sequential.seek(target).unwrap();
            windowed.seek(target).unwrap();
            assert_eq!(windowed.current_frame(), sequential.current_frame());
            assert_eq!(windowed.current_message(), sequential.current_message());
        }
    }

    #[test]
    fn test_window_invariant_holds() {
        let (_dir, mut reader) = open(40, 6);
        for target in [10, 3, 25, 24, 39, 1] {
            reader.seek(target).unwrap();
            let window = reader.window();
            assert_eq!(window.end - 1, reader.inner.current_frame());
            assert!(window.len() <= 6);
        }
    }
}
