//! Background log analysis
//!
//! While a log plays, a second pass over the same file runs on its own thread
//! with a private world, so it never contends for the playback lock. It
//! reports, as soon as each is known:
//!
//! - the frame step size, with an estimate of the total frame count
//! - every goal, with the frame to start watching it from
//! - the exact frame count, once the end of the log is reached

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace, warn};

use sparkview_shared::Team;

use crate::config::Config;
use crate::dispatch::{MessageDispatcher, World};
use crate::game_state::GameState;
use crate::logfile::{LogOptions, LogReader, SequentialReader, WindowedReader};

/// A goal found in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goal {
    /// Frame the score changed at
    pub frame: usize,
    /// Frame to start watching from
    pub view_frame: usize,
    pub scoring_team: Team,
}

/// Discoveries reported by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerEvent {
    StepSizeFound {
        step_size: f32,
        /// `None` when the log does not announce the half time
        estimated_frames: Option<usize>,
    },
    GoalFound(Goal),
    Finished {
        frame_count: usize,
    },
}

/// Analyzer tuning.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Seconds of lead-in before a goal
    pub goal_window_seconds: f32,
    /// Frame duration used for goals found before the step size is known
    pub default_seconds_per_frame: f32,
    /// Window of the analyzer's own reader
    pub window_size: usize,
    pub log_options: LogOptions,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            goal_window_seconds: 12.0,
            default_seconds_per_frame: 0.2,
            window_size: crate::logfile::DEFAULT_WINDOW_SIZE,
            log_options: LogOptions::default(),
        }
    }
}

impl AnalyzerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            goal_window_seconds: config.playback.goal_window_seconds,
            default_seconds_per_frame: config.playback.seconds_per_frame,
            window_size: config.logs.buffer_size,
            log_options: config.log_options(),
        }
    }
}

/// Goal and step size detection over a sequence of frames.
#[derive(Debug)]
pub struct Analysis {
    goal_window_seconds: f32,
    default_seconds_per_frame: f32,
    last_scores: Option<(i32, i32)>,
    start_time: Option<f32>,
    pause_frames: usize,
    step_size: Option<f32>,
}

impl Analysis {
    pub fn new(goal_window_seconds: f32, default_seconds_per_frame: f32) -> Self {
        Self {
            goal_window_seconds,
            default_seconds_per_frame,
            last_scores: None,
            start_time: None,
            pause_frames: 0,
            step_size: None,
        }
    }

    pub fn step_size(&self) -> Option<f32> {
        self.step_size
    }

    /// Inspect the state after `frame` was applied.
    pub fn process_frame(&mut self, frame: usize, state: &GameState) -> Vec<AnalyzerEvent> {
        let mut events = Vec::new();
        if let Some(goal) = self.check_goal(frame, state) {
            events.push(AnalyzerEvent::GoalFound(goal));
        }
        if let Some(found) = self.check_step_size(state) {
            events.push(found);
        }
        events
    }

    fn check_goal(&mut self, frame: usize, state: &GameState) -> Option<Goal> {
        let scores = (state.score_left(), state.score_right());
        let previous = self.last_scores.replace(scores)?;

        let scoring_team = if scores.0 != previous.0 {
            Team::Left
        } else if scores.1 != previous.1 {
            Team::Right
        } else {
            return None;
        };

        let step = self.step_size.unwrap_or(self.default_seconds_per_frame);
        let window_frames = (self.goal_window_seconds / step).round() as usize;
        let goal = Goal {
            frame,
            view_frame: frame.saturating_sub(window_frames),
            scoring_team,
        };
        debug!("goal for {:?} at frame {}", scoring_team, frame);
        Some(goal)
    }

    fn check_step_size(&mut self, state: &GameState) -> Option<AnalyzerEvent> {
        if self.step_size.is_some() {
            return None;
        }
        let time = state.time();
        let Some(start) = self.start_time else {
            self.start_time = Some(time);
            return None;
        };
        if time == start {
            self.pause_frames += 1;
            return None;
        }

        let step_size = time - start;
        self.step_size = Some(step_size);
        let half_time = state.measures().rule_half_time;
        let estimated_frames = (half_time > 0.0)
            .then(|| (half_time / step_size).round() as usize + self.pause_frames);
        debug!(
            "step size {} s, estimated {:?} frames",
            step_size, estimated_frames
        );
        Some(AnalyzerEvent::StepSizeFound {
            step_size,
            estimated_frames,
        })
    }
}

/// Run a full analysis over `reader`, sending events as they are found.
///
/// Returns early when `abort` is set or the receiver is gone.
pub fn analyze(
    reader: &mut dyn LogReader,
    settings: &AnalyzerSettings,
    abort: &AtomicBool,
    events: &Sender<AnalyzerEvent>,
) {
    let dispatcher = MessageDispatcher::new(Arc::new(Mutex::new(World::headless())));
    let mut analysis = Analysis::new(
        settings.goal_window_seconds,
        settings.default_seconds_per_frame,
    );

    loop {
        if abort.load(Ordering::Relaxed) {
            debug!("log analysis aborted at frame {}", reader.current_frame());
            return;
        }

        if let Some(message) = reader.current_message() {
            match dispatcher.dispatch(message) {
                Ok(_) => {
                    let world = dispatcher.lock();
                    for event in analysis.process_frame(reader.current_frame(), &world.game_state)
                    {
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!("skipping frame {}: {}", reader.current_frame(), e),
            }
        }

        if reader.is_at_end() {
            break;
        }
        match reader.step_forward() {
            Ok(Some(_)) => trace!("analyzing frame {}", reader.current_frame()),
            Ok(None) => break,
            Err(e) => {
                error!("unable to read log: {}", e);
                break;
            }
        }
    }

    let _ = events.send(AnalyzerEvent::Finished {
        frame_count: reader.frame_count(),
    });
}

/// Handle to a running analyzer thread. Dropping it aborts the scan.
pub struct LogAnalyzer {
    path: PathBuf,
    abort: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LogAnalyzer {
    /// Start analyzing `path` on a new thread.
    pub fn spawn(path: &Path, settings: AnalyzerSettings, events: Sender<AnalyzerEvent>) -> Self {
        let abort = Arc::new(AtomicBool::new(false));
        let thread_abort = abort.clone();
        let thread_path = path.to_path_buf();

        let handle = thread::Builder::new()
            .name("log-analyzer".into())
            .spawn(move || {
                let inner = match SequentialReader::open(&thread_path, &settings.log_options) {
                    Ok(inner) => inner,
                    Err(e) => {
                        error!("unable to open log {}: {}", thread_path.display(), e);
                        return;
                    }
                };
                let mut reader = WindowedReader::new(inner, settings.window_size);
                analyze(&mut reader, &settings, &thread_abort, &events);
                debug!("log analysis of {} finished", thread_path.display());
            })
            .expect("failed to spawn log analyzer thread");

        Self {
            path: path.to_path_buf(),
            abort,
            handle: Some(handle),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ask the thread to stop at the next frame.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait for the thread to exit.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LogAnalyzer {
    fn drop(&mut self) {
        self.abort();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
