//! Threaded log playback
//!
//! A [`LogPlayer`] owns one scheduler thread per open log. The thread owns
//! the reader and is the only writer of the playback world; the handle talks
//! to it through a small control block (play flag, speed, pending seek)
//! guarded by a mutex and a condvar. Results flow back as [`PlayerEvent`]s.
//!
//! A background [`LogAnalyzer`] scans the same log and feeds the scheduler
//! the step size, the goals and the exact frame count.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::analyzer::{AnalyzerEvent, AnalyzerSettings, Goal, LogAnalyzer};
use crate::config::Config;
use crate::dispatch::{ChangeSet, DispatchError, MessageDispatcher, World};
use crate::logfile::{
    DEFAULT_WINDOW_SIZE, LogError, LogHooks, LogOptions, LogReader, LogStrategy,
    LogfileListener, open_log,
};


/// Fastest playback in either direction, in multiples of real time.
pub const MAX_SPEED: f64 = 10.0;

/// Speed change per [`LogPlayer::increase_speed`] / [`LogPlayer::decrease_speed`].
pub const SPEED_STEP: f64 = 0.25;

/// Shortest frame duration the scheduler waits for.
const MIN_SECONDS_PER_FRAME: f32 = 0.001;

/// Playback errors.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("log {0} could not be opened")]
    InvalidLog(PathBuf),

    /// Walking back from `frame` reached frame 0 without finding a full scene
    #[error("log {path} has no full scene at or before frame {frame}")]
    CorruptLog { path: PathBuf, frame: usize },
}

/// Coarse player state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No log open
    Stopped,
    Paused,
    /// Advancing at a non-zero speed
    Playing,
}

/// Changes published by a [`LogPlayer`].
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    LogOpened(PathBuf),
    LogClosed,
    StateChanged(PlayerState),
    SpeedChanged(f64),
    FrameChanged { frame: usize, frame_count: usize },
    StepSizeChanged(f32),
    GoalFound(Goal),
    AnalysisFinished { frame_count: usize },
    Error(Arc<PlaybackError>),
}

/// Which way to look for a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalDirection {
    Previous,
    Next,
}

impl GoalDirection {
    fn as_str(self) -> &'static str {
        match self {
            GoalDirection::Previous => "previous",
            GoalDirection::Next => "next",
        }
    }
}

/// Player tuning.
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// Frame duration until the analyzer reports one
    pub seconds_per_frame: f32,
    /// Frame duration for logs with draw commands, until the analyzer reports one
    pub draw_command_seconds_per_frame: f32,
    pub goal_window_seconds: f32,
    /// Goals within this many seconds of the current frame are skipped
    pub goal_step_threshold_seconds: f32,
    pub strategy: LogStrategy,
    pub log_options: LogOptions,
    /// Run the background analyzer on open
    pub analyze: bool,
    /// Start playing as soon as a log is open
    pub autoplay: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            seconds_per_frame: 0.2,
            draw_command_seconds_per_frame: 0.04,
            goal_window_seconds: 12.0,
            goal_step_threshold_seconds: 3.0,
            strategy: LogStrategy::default(),
            log_options: LogOptions::default(),
            analyze: true,
            autoplay: true,
        }
    }
}

impl PlaybackSettings {
    pub fn from_config(config: &Config) -> Self {
        let playback = &config.playback;
        Self {
            seconds_per_frame: playback.seconds_per_frame,
            draw_command_seconds_per_frame: playback.draw_command_seconds_per_frame,
            goal_window_seconds: playback.goal_window_seconds,
            goal_step_threshold_seconds: playback.goal_step_threshold_seconds,
            strategy: config.logs.log_strategy(),
            log_options: config.log_options(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Shared control block
// ============================================================================

struct Control {
    has_log: bool,
    playing: bool,
    speed: f64,
    desired_frame: Option<usize>,

    // Published by the scheduler
    frame: usize,
    frame_count: usize,
    at_beginning: bool,
    at_end: bool,

    seconds_per_frame: f32,
    step_size_found: bool,
    has_draw_commands: bool,
    goals: Vec<Goal>,
    analyzed: bool,
    analyzed_frames: usize,

    subscribers: Vec<Sender<PlayerEvent>>,
}

impl Control {
    fn state(&self) -> PlayerState {
        if !self.has_log {
            PlayerState::Stopped
        } else if self.playing && self.speed != 0.0 {
            PlayerState::Playing
        } else {
            PlayerState::Paused
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            let state = self.state();
            self.emit(PlayerEvent::StateChanged(state));
        }
    }

    fn desired_frame(&self) -> usize {
        self.desired_frame.unwrap_or(self.frame)
    }

    /// Frame duration, never zero or negative.
    fn frame_seconds(&self) -> f32 {
        self.seconds_per_frame.max(MIN_SECONDS_PER_FRAME)
    }
}

struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
    settings: PlaybackSettings,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| {
            warn!("player control mutex poisoned; continuing");
            e.into_inner()
        })
    }

    fn goal_threshold_frames(&self, control: &Control) -> i64 {
        (self.settings.goal_step_threshold_seconds / control.frame_seconds()).round() as i64
    }
}

/// Switches to the draw command frame duration while no step size is known.
struct DrawCommandListener {
    shared: Arc<Shared>,
}

impl LogfileListener for DrawCommandListener {
    fn draw_commands_found(&self) {
        let mut control = self.shared.lock();
        if control.has_draw_commands {
            return;
        }
        control.has_draw_commands = true;
        if !control.step_size_found {
            control.seconds_per_frame = self.shared.settings.draw_command_seconds_per_frame;
            debug!(
                "log has draw commands, assuming {} s per frame",
                control.seconds_per_frame
            );
        }
    }
}

// ============================================================================
// Goal navigation
// ============================================================================

/// Latest goal whose view frame lies before `desired - threshold`, with its
/// 1-based ordinal.
pub fn previous_goal(goals: &[Goal], desired: usize, threshold: i64) -> Option<(usize, Goal)> {
    let limit = desired as i64 - threshold;
    goals
        .iter()
        .enumerate()
        .filter(|(_, goal)| (goal.view_frame as i64) < limit)
        .max_by_key(|(_, goal)| goal.view_frame)
        .map(|(i, goal)| (i + 1, *goal))
}

/// Earliest goal whose view frame lies after `desired + threshold`, with its
/// 1-based ordinal.
pub fn next_goal(goals: &[Goal], desired: usize, threshold: i64) -> Option<(usize, Goal)> {
    let limit = desired as i64 + threshold;
    goals
        .iter()
        .enumerate()
        .filter(|(_, goal)| (goal.view_frame as i64) > limit)
        .min_by_key(|(_, goal)| goal.view_frame)
        .map(|(i, goal)| (i + 1, *goal))
}

fn find_goal(
    direction: GoalDirection,
    goals: &[Goal],
    desired: usize,
    threshold: i64,
) -> Option<(usize, Goal)> {
    match direction {
        GoalDirection::Previous => previous_goal(goals, desired, threshold),
        GoalDirection::Next => next_goal(goals, desired, threshold),
    }
}

/// "Next goal: 2/3" or "No next goals".
pub fn describe_goal(direction: GoalDirection, ordinal: Option<usize>, total: usize) -> String {
    match ordinal {
        Some(ordinal) => {
            let name = direction.as_str();
            let mut chars = name.chars();
            let capitalized: String = chars
                .next()
                .map(|c| c.to_ascii_uppercase())
                .into_iter()
                .chain(chars)
                .collect();
            format!("{} goal: {}/{}", capitalized, ordinal, total)
        }
        None => format!("No {} goals", direction.as_str()),
    }
}

// ============================================================================
// Player handle
// ============================================================================

struct Session {
    path: PathBuf,
    abort: Arc<AtomicBool>,
    shared: Arc<Shared>,
    scheduler: Option<JoinHandle<()>>,
    analyzer: Option<LogAnalyzer>,
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(analyzer) = self.analyzer.take() {
            analyzer.abort();
            drop(analyzer);
        }

        self.abort.store(true, Ordering::Relaxed);
        {
            // Taking the lock orders the store before the scheduler's next wait
            let _control = self.shared.lock();
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.scheduler.take() {
            let _ = handle.join();
        }
        debug!("playback of {} stopped", self.path.display());
    }
}

/// Variable-speed playback of a recorded log into a shared world.
pub struct LogPlayer {
    shared: Arc<Shared>,
    dispatcher: MessageDispatcher,
    session: Option<Session>,
}

impl LogPlayer {
    /// Create a stopped player that will play into `world`.
    pub fn new(world: Arc<Mutex<World>>, settings: PlaybackSettings) -> Self {
        let control = Control {
            has_log: false,
            playing: false,
            speed: 1.0,
            desired_frame: None,
            frame: 0,
            frame_count: 0,
            at_beginning: true,
            at_end: false,
            seconds_per_frame: settings.seconds_per_frame,
            step_size_found: false,
            has_draw_commands: false,
            goals: Vec::new(),
            analyzed: false,
            analyzed_frames: 0,
            subscribers: Vec::new(),
        };
        Self {
            shared: Arc::new(Shared {
                control: Mutex::new(control),
                wake: Condvar::new(),
                settings,
            }),
            dispatcher: MessageDispatcher::new(world),
            session: None,
        }
    }

    /// Receive [`PlayerEvent`]s on `sender` until it is dropped.
    pub fn subscribe(&self, sender: Sender<PlayerEvent>) {
        self.shared.lock().subscribers.push(sender);
    }

    pub fn world(&self) -> &Arc<Mutex<World>> {
        self.dispatcher.world()
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.shared.settings
    }

    /// Open `path` and start its scheduler and analyzer.
    ///
    /// Any open log is closed first. The first frame is applied by the
    /// scheduler; a log whose first frame is not a full scene is reported
    /// as [`PlaybackError::CorruptLog`] through a [`PlayerEvent::Error`].
    pub fn open(&mut self, path: &Path) -> Result<(), PlaybackError> {
        self.stop();

        let settings = &self.shared.settings;
        {
            let mut control = self.shared.lock();
            control.desired_frame = None;
            control.frame = 0;
            control.frame_count = 0;
            control.seconds_per_frame = settings.seconds_per_frame;
            control.step_size_found = false;
            control.has_draw_commands = false;
            control.goals.clear();
            control.analyzed = false;
            control.analyzed_frames = 0;
        }
        self.dispatcher.lock().reset();

        let listener = Arc::new(DrawCommandListener {
            shared: self.shared.clone(),
        });
        let hooks = settings.log_options.hooks.clone().with_listener(listener);
        let options = settings.log_options.clone().with_hooks(hooks.clone());

        let reader = open_log(path, settings.strategy, &options)?;
        if !reader.is_valid() {
            return Err(PlaybackError::InvalidLog(path.to_path_buf()));
        }
        debug!("opened log {}", path.display());

        let (analyzer, analyzer_events) = if settings.analyze {
            let (tx, rx) = mpsc::channel();
            let window_size = match settings.strategy {
                LogStrategy::Windowed(size) | LogStrategy::Auto(size) => size,
                _ => DEFAULT_WINDOW_SIZE,
            };
            let analyzer_settings = AnalyzerSettings {
                goal_window_seconds: settings.goal_window_seconds,
                default_seconds_per_frame: settings.seconds_per_frame,
                window_size,
                // draw commands are executed by playback only
                log_options: options.clone().with_hooks(LogHooks {
                    sink: None,
                    ..hooks
                }),
            };
            (
                Some(LogAnalyzer::spawn(path, analyzer_settings, tx)),
                Some(rx),
            )
        } else {
            (None, None)
        };

        {
            let mut control = self.shared.lock();
            control.has_log = true;
            control.playing = settings.autoplay;
            control.frame_count = reader.frame_count();
            control.emit(PlayerEvent::LogOpened(path.to_path_buf()));
            let state = control.state();
            control.emit(PlayerEvent::StateChanged(state));
        }

        let abort = Arc::new(AtomicBool::new(false));
        let scheduler = Scheduler {
            reader,
            dispatcher: self.dispatcher.clone(),
            shared: self.shared.clone(),
            abort: abort.clone(),
            analyzer_events,
        };
        let handle = thread::Builder::new()
            .name("log-player".into())
            .spawn(move || scheduler.run())
            .expect("failed to spawn log player thread");

        self.session = Some(Session {
            path: path.to_path_buf(),
            abort,
            shared: self.shared.clone(),
            scheduler: Some(handle),
            analyzer,
        });
        Ok(())
    }

    /// Close the log and stop both threads.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        drop(session);

        let mut control = self.shared.lock();
        control.has_log = false;
        control.playing = false;
        control.desired_frame = None;
        control.goals.clear();
        control.emit(PlayerEvent::LogClosed);
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    pub fn state(&self) -> PlayerState {
        self.shared.lock().state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    pub fn frame(&self) -> usize {
        self.shared.lock().frame
    }

    /// The frame a pending seek will land on, or the current frame.
    pub fn desired_frame(&self) -> usize {
        self.shared.lock().desired_frame()
    }

    pub fn frame_count(&self) -> usize {
        self.shared.lock().frame_count
    }

    pub fn is_at_beginning(&self) -> bool {
        let control = self.shared.lock();
        control.has_log && control.at_beginning
    }

    pub fn is_at_end(&self) -> bool {
        let control = self.shared.lock();
        control.has_log && control.at_end
    }

    pub fn pause(&self) {
        self.shared.lock().set_playing(false);
    }

    pub fn resume(&self) {
        let mut control = self.shared.lock();
        if control.has_log {
            control.set_playing(true);
        }
    }

    pub fn rewind(&self) {
        self.seek(0);
    }

    pub fn step_forward(&self) {
        let frame = self.frame();
        self.seek(frame + 1);
    }

    pub fn step_backward(&self) {
        let frame = self.frame();
        self.seek(frame.saturating_sub(1));
    }

    /// Request a jump to `frame`. Applied by the scheduler on its next wakeup.
    pub fn seek(&self, frame: usize) {
        let mut control = self.shared.lock();
        if !control.has_log {
            return;
        }
        control.desired_frame = Some(frame);
        self.shared.wake.notify_all();
    }

    pub fn speed(&self) -> f64 {
        self.shared.lock().speed
    }

    /// Set the speed in multiples of real time; negative plays backward.
    pub fn set_speed(&self, speed: f64) {
        let mut control = self.shared.lock();
        control.speed = speed.clamp(-MAX_SPEED, MAX_SPEED);
        let speed = control.speed;
        control.emit(PlayerEvent::SpeedChanged(speed));
    }

    pub fn increase_speed(&self) {
        self.set_speed(self.speed() + SPEED_STEP);
    }

    pub fn decrease_speed(&self) {
        self.set_speed(self.speed() - SPEED_STEP);
    }

    /// Current frame duration in seconds.
    pub fn seconds_per_frame(&self) -> f32 {
        self.shared.lock().seconds_per_frame
    }

    pub fn has_draw_commands(&self) -> bool {
        self.shared.lock().has_draw_commands
    }

    /// Whether the analyzer has scanned the whole log.
    pub fn is_analyzed(&self) -> bool {
        self.shared.lock().analyzed
    }

    /// How far the analyzer has reported.
    pub fn analyzed_frames(&self) -> usize {
        self.shared.lock().analyzed_frames
    }

    pub fn goals(&self) -> Vec<Goal> {
        self.shared.lock().goals.clone()
    }

    fn goal(&self, direction: GoalDirection) -> Option<(usize, Goal)> {
        let control = self.shared.lock();
        let threshold = self.shared.goal_threshold_frames(&control);
        find_goal(direction, &control.goals, control.desired_frame(), threshold)
    }

    pub fn has_previous_goal(&self) -> bool {
        self.goal(GoalDirection::Previous).is_some()
    }

    pub fn has_next_goal(&self) -> bool {
        self.goal(GoalDirection::Next).is_some()
    }

    /// Jump to the nearest goal in `direction` beyond the skip threshold.
    /// Returns the view frame jumped to.
    pub fn seek_to_goal(&self, direction: GoalDirection) -> Option<usize> {
        let (_, goal) = self.goal(direction)?;
        self.seek(goal.view_frame);
        Some(goal.view_frame)
    }

    /// Label for the goal a [`LogPlayer::seek_to_goal`] would reach.
    pub fn goal_description(&self, direction: GoalDirection) -> String {
        let ordinal = self.goal(direction).map(|(ordinal, _)| ordinal);
        describe_goal(direction, ordinal, self.shared.lock().goals.len())
    }
}

impl Drop for LogPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Scheduler thread
// ============================================================================

/// Time between scheduler ticks: one frame scaled by the speed while
/// playing, one unscaled frame while idle.
fn frame_wait(seconds_per_frame: f32, speed: f64, playing: bool) -> Duration {
    let ms_per_frame = f64::from(seconds_per_frame.max(MIN_SECONDS_PER_FRAME)) * 1000.0;
    let millis = if playing && speed != 0.0 {
        (ms_per_frame / speed.abs()).round()
    } else {
        ms_per_frame.round()
    };
    Duration::from_millis(millis.max(1.0) as u64)
}

struct Scheduler {
    reader: Box<dyn LogReader>,
    dispatcher: MessageDispatcher,
    shared: Arc<Shared>,
    abort: Arc<AtomicBool>,
    analyzer_events: Option<Receiver<AnalyzerEvent>>,
}

impl Scheduler {
    fn run(mut self) {
        if let Err(e) = self.jump(0) {
            self.fail(e);
        }
        self.publish_position();

        while !self.abort.load(Ordering::Relaxed) {
            self.drain_analyzer();

            if let Some(target) = self.wait_for_target()
                && let Err(e) = self.set_frame(target)
            {
                self.fail(e);
            }
            self.publish_position();
        }

        self.reader.close();
        debug!("log player thread exiting");
    }

    /// Sleep for one frame and pick the frame to show next, if any.
    fn wait_for_target(&mut self) -> Option<usize> {
        let at_beginning = self.reader.is_at_beginning();
        let at_end = self.reader.is_at_end();
        let current = self.reader.current_frame();

        let mut control = self.shared.lock();
        let blocked = (at_end && control.speed > 0.0) || (at_beginning && control.speed < 0.0);
        if blocked && control.desired_frame.is_none() {
            control.set_playing(false);
        }

        let timeout = frame_wait(control.frame_seconds(), control.speed, control.playing);

        let abort = &self.abort;
        let (mut control, wait) = self
            .shared
            .wake
            .wait_timeout_while(control, timeout, |c| {
                c.desired_frame.is_none() && !abort.load(Ordering::Relaxed)
            })
            .unwrap_or_else(|e| {
                warn!("player control mutex poisoned; continuing");
                e.into_inner()
            });

        if let Some(desired) = control.desired_frame.take() {
            return Some(desired);
        }
        if !wait.timed_out() || !control.playing {
            return None;
        }
        if control.speed > 0.0 {
            Some(current + 1)
        } else if control.speed < 0.0 {
            current.checked_sub(1)
        } else {
            None
        }
    }

    fn set_frame(&mut self, target: usize) -> Result<(), PlaybackError> {
        let current = self.reader.current_frame();
        if target == current {
            return Ok(());
        }
        if target == current + 1 {
            self.advance()
        } else {
            self.jump(target)
        }
    }

    /// Step one frame forward onto the resident scene.
    fn advance(&mut self) -> Result<(), PlaybackError> {
        if self.reader.step_forward()?.is_none() {
            return Ok(());
        }
        let frame = self.reader.current_frame();
        match self.apply_current() {
            Err(e) if e.is_missing_state() => {
                debug!("frame {} needs a resident scene, reloading", frame);
                self.jump(frame)
            }
            Err(e) => {
                warn!("skipping frame {}: {}", frame, e);
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }

    /// Show `target` from scratch: find the closest frame at or before it
    /// that applies on an empty scene, then replay forward.
    fn jump(&mut self, target: usize) -> Result<(), PlaybackError> {
        self.dispatcher.lock().scene.reset();

        self.reader.seek(target)?;
        let target = self.reader.current_frame();
        let mut base = target;
        while let Err(e) = self.apply_current() {
            if !e.is_missing_state() {
                warn!("skipping frame {}: {}", base, e);
            }
            if base == 0 {
                return Err(PlaybackError::CorruptLog {
                    path: self.reader.path().to_path_buf(),
                    frame: target,
                });
            }
            base -= 1;
            self.reader.seek(base)?;
        }

        while self.reader.current_frame() < target {
            if self.reader.step_forward()?.is_none() {
                break;
            }
            if let Err(e) = self.apply_current() {
                warn!("skipping frame {}: {}", self.reader.current_frame(), e);
            }
        }
        trace!("jumped to frame {} via frame {}", target, base);
        Ok(())
    }

    fn apply_current(&self) -> Result<Option<ChangeSet>, DispatchError> {
        match self.reader.current_message() {
            Some(message) => self.dispatcher.dispatch(message).map(Some),
            None => Ok(None),
        }
    }

    fn fail(&mut self, e: PlaybackError) {
        error!("playback failed: {}", e);
        let mut control = self.shared.lock();
        control.set_playing(false);
        control.emit(PlayerEvent::Error(Arc::new(e)));
    }

    fn publish_position(&mut self) {
        let frame = self.reader.current_frame();
        let frame_count = self.reader.frame_count();
        let at_beginning = self.reader.is_at_beginning();
        let at_end = self.reader.is_at_end();

        let mut control = self.shared.lock();
        let changed = control.frame != frame || control.frame_count != frame_count;
        control.frame = frame;
        control.frame_count = frame_count;
        control.at_beginning = at_beginning;
        control.at_end = at_end;
        if changed {
            control.emit(PlayerEvent::FrameChanged { frame, frame_count });
        }
    }

    fn drain_analyzer(&mut self) {
        let Some(events) = &self.analyzer_events else {
            return;
        };
        let mut received = Vec::new();
        let disconnected = loop {
            match events.try_recv() {
                Ok(event) => received.push(event),
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Disconnected) => break true,
            }
        };
        if disconnected {
            self.analyzer_events = None;
        }

        for event in received {
            match event {
                AnalyzerEvent::StepSizeFound {
                    step_size,
                    estimated_frames,
                } => {
                    if let Some(estimate) = estimated_frames {
                        self.reader.set_frame_count(estimate);
                    }
                    let mut control = self.shared.lock();
                    control.step_size_found = true;
                    control.seconds_per_frame = step_size;
                    control.emit(PlayerEvent::StepSizeChanged(step_size));
                }
                AnalyzerEvent::GoalFound(goal) => {
                    let mut control = self.shared.lock();
                    control.goals.push(goal);
                    control.analyzed_frames = goal.frame;
                    control.emit(PlayerEvent::GoalFound(goal));
                }
                AnalyzerEvent::Finished { frame_count } => {
                    self.reader.set_frame_count(frame_count);
                    let mut control = self.shared.lock();
                    control.analyzed = true;
                    control.analyzed_frames = frame_count;
                    control.emit(PlayerEvent::AnalysisFinished { frame_count });
                }
            }
        }
    }
}
