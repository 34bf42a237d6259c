//! Shared test utilities for integration and unit tests

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::logfile::create_encoded_writer;

// ============================================================================
// Log files
// ============================================================================

/// `line 0`, `line 1`, ...
pub fn numbered_lines(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("line {}", i)).collect()
}

/// Write lines to `dir/name`, compressed according to the suffix.
pub fn write_log(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = create_encoded_writer(&path).unwrap();
    for line in lines {
        writeln!(writer, "{}", line).unwrap();
    }
    writer.flush().unwrap();
    drop(writer);
    path
}

// ============================================================================
// Monitor messages
// ============================================================================

const FULL_SCENE: &str = "(RSG 0 1)((nd TRF (SLT 1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1))(nd Light))";
const DIFF_SCENE: &str = "(RDS 0 1)((nd (SLT 1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1))(nd))";

/// One frame of a synthetic match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSpec {
    pub time: f32,
    pub score_left: i32,
    pub score_right: i32,
}

/// Builds monitor logs: frame 0 carries the rules and a full scene, later
/// frames carry time and scores with a scene diff (or a full scene every
/// `full_every` frames).
#[derive(Debug, Clone)]
pub struct MatchLogBuilder {
    half_time: Option<f32>,
    full_every: usize,
    first_frame_full: bool,
    frames: Vec<FrameSpec>,
}

impl Default for MatchLogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchLogBuilder {
    pub fn new() -> Self {
        Self {
            half_time: Some(300.0),
            full_every: 0,
            first_frame_full: true,
            frames: Vec::new(),
        }
    }

    pub fn half_time(mut self, half_time: Option<f32>) -> Self {
        self.half_time = half_time;
        self
    }

    /// Emit a full scene every `n` frames (0 = only frame 0).
    pub fn full_every(mut self, n: usize) -> Self {
        self.full_every = n;
        self
    }

    /// Start the log with a diff, as if it were cut from a longer recording.
    pub fn truncated(mut self) -> Self {
        self.first_frame_full = false;
        self
    }

    pub fn frame(mut self, time: f32, score_left: i32, score_right: i32) -> Self {
        self.frames.push(FrameSpec {
            time,
            score_left,
            score_right,
        });
        self
    }

    /// `count` frames spaced by `step`, scoreless.
    pub fn steady(mut self, count: usize, step: f32) -> Self {
        let start = self.frames.last().map(|f| f.time + step).unwrap_or(0.0);
        let (l, r) = self
            .frames
            .last()
            .map(|f| (f.score_left, f.score_right))
            .unwrap_or((0, 0));
        for i in 0..count {
            self = self.frame(start + step * i as f32, l, r);
        }
        self
    }

    pub fn build(&self) -> Vec<String> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let full = if i == 0 {
                    self.first_frame_full
                } else {
                    self.full_every > 0 && i % self.full_every == 0
                };
                let rules = if i == 0 {
                    let half = self
                        .half_time
                        .map(|h| format!("(RuleHalfTime {})", h))
                        .unwrap_or_default();
                    format!(
                        "(FieldLength 30)(FieldWidth 20){}(play_modes BeforeKickOff KickOff_Left KickOff_Right PlayOn Goal_Left Goal_Right GameOver)(team_left Alpha)(team_right Beta)(play_mode 3)",
                        half
                    )
                } else {
                    String::new()
                };
                format!(
                    "({}(time {})(half 1)(score_left {})(score_right {})){}",
                    rules,
                    f.time,
                    f.score_left,
                    f.score_right,
                    if full { FULL_SCENE } else { DIFF_SCENE }
                )
            })
            .collect()
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        write_log(dir, name, &self.build())
    }
}
