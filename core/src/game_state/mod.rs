//! Soccer game state tracked from monitor messages
//!
//! The first expression of every monitor message is a list of `(name value...)`
//! deltas. [`GameState::apply_state_delta`] folds them into the snapshot and
//! reports how many fields changed per category. Fields the tracker does not
//! know are ignored; a known field with an unparsable value is logged and
//! keeps its previous value.

use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use tracing::warn;

use sparkview_shared::protocol::{self, play_mode};
use sparkview_shared::{Expression, FoulType, Team};


/// Number of play mode transitions kept in the history.
pub const PLAY_MODE_HISTORY_LEN: usize = 2;

/// Fouls of the same kind closer than this (server seconds) are one foul.
pub const FOUL_DEDUP_SECONDS: f32 = 1.0;

/// Wall-clock time a foul is shown at full opacity.
pub const FOUL_SHOW_TIME: Duration = Duration::from_secs(8);

/// Wall-clock time a foul fades out after [`FOUL_SHOW_TIME`].
pub const FOUL_FADE_TIME: Duration = Duration::from_secs(2);

// Servers that predate pass mode never report these.
const DEFAULT_PASS_MODE_MIN_OPP_BALL_DIST: f32 = 1.0;
const DEFAULT_PASS_MODE_DURATION: f32 = 4.0;

bitflags! {
    /// Categories of state that changed while applying a delta.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeFlags: u8 {
        /// Team names, scores, play mode
        const PLAY_STATE = 0x01;
        /// Time, half, pass mode wait times
        const TIME = 0x02;
        /// Field measurements and rules
        const MEASURES_AND_RULES = 0x04;
    }
}

/// Per-category field counts for one applied delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub play_state: u32,
    pub time: u32,
    pub measures_and_rules: u32,
}

impl ChangeCounts {
    pub fn total(&self) -> u32 {
        self.play_state + self.time + self.measures_and_rules
    }

    /// Categories with at least one change.
    pub fn flags(&self) -> ChangeFlags {
        let mut flags = ChangeFlags::empty();
        flags.set(ChangeFlags::PLAY_STATE, self.play_state > 0);
        flags.set(ChangeFlags::TIME, self.time > 0);
        flags.set(ChangeFlags::MEASURES_AND_RULES, self.measures_and_rules > 0);
        flags
    }
}

/// Notification sent to subscribers after a delta changed something.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameStateEvent {
    pub changes: ChangeFlags,
    /// Server time after the delta
    pub time: f32,
}

/// Reasons a known field could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("field '{field}' has no value")]
    MissingValue { field: String },

    #[error("field '{field}' has invalid value '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("play mode index {index} is not in the announced play modes")]
    UnknownPlayMode { index: usize },
}

/// Field measurements and game rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measures {
    pub field_length: f32,
    pub field_width: f32,
    pub field_height: f32,
    pub goal_width: f32,
    pub goal_depth: f32,
    pub goal_height: f32,
    pub free_kick_distance: f32,
    pub wait_before_kick_off: f32,
    pub agent_radius: f32,
    pub ball_radius: f32,
    pub ball_mass: f32,
    pub rule_goal_pause_time: f32,
    pub rule_kick_in_pause_time: f32,
    pub rule_half_time: f32,
    pub pass_mode_min_opp_ball_dist: f32,
    pub pass_mode_duration: f32,
}

/// A play mode transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayModeChange {
    /// Server time of the transition
    pub time: f32,
    pub mode: String,
}

/// A foul reported by the referee.
#[derive(Debug, Clone, PartialEq)]
pub struct Foul {
    /// Server time the foul was reported at
    pub time: f32,
    pub index: u32,
    pub kind: FoulType,
    pub team: Team,
    pub agent: u32,
    /// Wall-clock receipt time, drives display and expiry
    pub received_at: Instant,
}

impl Foul {
    /// Whether the foul is still inside its display window at `now`.
    pub fn is_displayed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.received_at) < FOUL_SHOW_TIME + FOUL_FADE_TIME
    }

    /// Display opacity at `now`: 1 while shown, fading to 0, `None` once gone.
    pub fn display_opacity(&self, now: Instant) -> Option<f32> {
        if !self.is_displayed(now) {
            return None;
        }
        let age = now.saturating_duration_since(self.received_at);
        if age <= FOUL_SHOW_TIME {
            Some(1.0)
        } else {
            let fade = (age - FOUL_SHOW_TIME).as_secs_f32() / FOUL_FADE_TIME.as_secs_f32();
            Some(1.0 - fade)
        }
    }

    fn same_as(&self, other: &Foul) -> bool {
        self.kind == other.kind
            && self.team == other.team
            && self.agent == other.agent
            && (self.time - other.time).abs() < FOUL_DEDUP_SECONDS
    }
}

/// Snapshot of the game as reported by the server.
#[derive(Debug)]
pub struct GameState {
    initialized: bool,
    measures: Measures,
    pass_mode_values_reported: bool,
    pass_mode_score_wait_left: f32,
    pass_mode_score_wait_right: f32,
    play_modes: Vec<String>,
    team_left: Option<String>,
    team_right: Option<String>,
    score_left: i32,
    score_right: i32,
    play_mode: Option<String>,
    play_mode_changed: bool,
    play_mode_history: Vec<PlayModeChange>,
    time: f32,
    half: i32,
    fouls: Vec<Foul>,
    subscribers: Vec<Sender<GameStateEvent>>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            initialized: false,
            measures: Measures {
                pass_mode_min_opp_ball_dist: DEFAULT_PASS_MODE_MIN_OPP_BALL_DIST,
                pass_mode_duration: DEFAULT_PASS_MODE_DURATION,
                ..Measures::default()
            },
            pass_mode_values_reported: false,
            pass_mode_score_wait_left: 0.0,
            pass_mode_score_wait_right: 0.0,
            play_modes: Vec::new(),
            team_left: None,
            team_right: None,
            score_left: 0,
            score_right: 0,
            play_mode: None,
            play_mode_changed: false,
            play_mode_history: Vec::new(),
            time: 0.0,
            half: 0,
            fouls: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Forget the current game. Measurements and announced play modes are
    /// kept; the server resends them with the next full state.
    pub fn reset(&mut self) {
        self.initialized = false;
        self.team_left = None;
        self.team_right = None;
        self.score_left = 0;
        self.score_right = 0;
        self.play_mode = None;
        self.play_mode_changed = false;
        self.play_mode_history.clear();
        self.time = 0.0;
        self.half = 0;
        self.fouls.clear();
        self.measures.pass_mode_min_opp_ball_dist = DEFAULT_PASS_MODE_MIN_OPP_BALL_DIST;
        self.measures.pass_mode_duration = DEFAULT_PASS_MODE_DURATION;
        self.pass_mode_values_reported = false;
    }

    /// Register for change notifications. Dropped receivers are pruned on
    /// the next send.
    pub fn subscribe(&mut self, sender: Sender<GameStateEvent>) {
        self.subscribers.push(sender);
    }

    /// Apply one state delta expression.
    pub fn apply_state_delta(&mut self, expr: &Expression) -> ChangeCounts {
        self.apply_state_delta_at(expr, Instant::now())
    }

    /// Apply one state delta with an explicit wall-clock time.
    pub fn apply_state_delta_at(&mut self, expr: &Expression, now: Instant) -> ChangeCounts {
        let mut counts = ChangeCounts::default();
        let previous_mode = self.play_mode.clone();

        self.remove_expired_fouls(now);
        self.pass_mode_score_wait_left = 0.0;
        self.pass_mode_score_wait_right = 0.0;

        for child in expr.children() {
            let Some(name) = child.name() else {
                continue;
            };
            if let Err(e) = self.apply_field(name, child, now, &mut counts) {
                warn!("skipping state field: {}", e);
            }
        }

        self.play_mode_changed = self.play_mode.is_some() && self.play_mode != previous_mode;
        if self.play_mode_changed
            && let Some(mode) = &self.play_mode
        {
            self.play_mode_history.push(PlayModeChange {
                time: self.time,
                mode: mode.clone(),
            });
            let excess = self
                .play_mode_history
                .len()
                .saturating_sub(PLAY_MODE_HISTORY_LEN);
            self.play_mode_history.drain(..excess);
        }

        self.initialized = true;

        if counts.total() > 0 {
            let event = GameStateEvent {
                changes: counts.flags(),
                time: self.time,
            };
            self.subscribers.retain(|s| s.send(event).is_ok());
        }

        counts
    }

    fn apply_field(
        &mut self,
        name: &str,
        expr: &Expression,
        now: Instant,
        counts: &mut ChangeCounts,
    ) -> Result<(), StateError> {
        let m = &mut self.measures;
        let measure = match name {
            protocol::FIELD_LENGTH => Some(&mut m.field_length),
            protocol::FIELD_WIDTH => Some(&mut m.field_width),
            protocol::FIELD_HEIGHT => Some(&mut m.field_height),
            protocol::GOAL_WIDTH => Some(&mut m.goal_width),
            protocol::GOAL_DEPTH => Some(&mut m.goal_depth),
            protocol::GOAL_HEIGHT => Some(&mut m.goal_height),
            protocol::FREE_KICK_DISTANCE => Some(&mut m.free_kick_distance),
            protocol::WAIT_BEFORE_KICK_OFF => Some(&mut m.wait_before_kick_off),
            protocol::AGENT_RADIUS => Some(&mut m.agent_radius),
            protocol::BALL_RADIUS => Some(&mut m.ball_radius),
            protocol::BALL_MASS => Some(&mut m.ball_mass),
            protocol::RULE_GOAL_PAUSE_TIME => Some(&mut m.rule_goal_pause_time),
            protocol::RULE_KICK_IN_PAUSE_TIME => Some(&mut m.rule_kick_in_pause_time),
            protocol::RULE_HALF_TIME => Some(&mut m.rule_half_time),
            protocol::PASS_MODE_MIN_OPP_BALL_DIST => Some(&mut m.pass_mode_min_opp_ball_dist),
            protocol::PASS_MODE_DURATION => Some(&mut m.pass_mode_duration),
            _ => None,
        };
        if let Some(slot) = measure {
            *slot = value(name, expr, 1)?;
            if matches!(
                name,
                protocol::PASS_MODE_MIN_OPP_BALL_DIST | protocol::PASS_MODE_DURATION
            ) {
                self.pass_mode_values_reported = true;
            }
            counts.measures_and_rules += 1;
            return Ok(());
        }

        match name {
            protocol::PLAY_MODES => {
                self.play_modes = expr.atoms()[1..].to_vec();
                counts.play_state += 1;
            }
            protocol::PLAY_MODE => {
                let index: usize = value(name, expr, 1)?;
                let mode = self
                    .play_modes
                    .get(index)
                    .ok_or(StateError::UnknownPlayMode { index })?;
                self.play_mode = Some(mode.clone());
                counts.play_state += 1;
            }
            protocol::TEAM_LEFT => {
                self.team_left = Some(text(name, expr, 1)?.to_string());
                counts.play_state += 1;
            }
            protocol::TEAM_RIGHT => {
                self.team_right = Some(text(name, expr, 1)?.to_string());
                counts.play_state += 1;
            }
            protocol::SCORE_LEFT => {
                self.score_left = value(name, expr, 1)?;
                counts.play_state += 1;
            }
            protocol::SCORE_RIGHT => {
                self.score_right = value(name, expr, 1)?;
                counts.play_state += 1;
            }
            protocol::TIME => {
                self.time = value(name, expr, 1)?;
                counts.time += 1;
            }
            protocol::HALF => {
                self.half = value(name, expr, 1)?;
                counts.time += 1;
            }
            protocol::PASS_MODE_SCORE_WAIT_LEFT => {
                self.pass_mode_score_wait_left = value(name, expr, 1)?;
                self.pass_mode_values_reported = true;
                counts.time += 1;
            }
            protocol::PASS_MODE_SCORE_WAIT_RIGHT => {
                self.pass_mode_score_wait_right = value(name, expr, 1)?;
                self.pass_mode_values_reported = true;
                counts.time += 1;
            }
            protocol::FOUL => {
                let foul = self.parse_foul(expr, now)?;
                self.add_foul(foul);
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_foul(&self, expr: &Expression, now: Instant) -> Result<Foul, StateError> {
        let name = protocol::FOUL;
        let kind_index: usize = value(name, expr, 2)?;
        let kind = FoulType::from_index(kind_index).ok_or_else(|| StateError::InvalidValue {
            field: name.to_string(),
            value: kind_index.to_string(),
        })?;
        let team_index: i32 = value(name, expr, 3)?;
        let team = Team::from_index(team_index).ok_or_else(|| StateError::InvalidValue {
            field: name.to_string(),
            value: team_index.to_string(),
        })?;

        Ok(Foul {
            time: self.time,
            index: value(name, expr, 1)?,
            kind,
            team,
            agent: value(name, expr, 4)?,
            received_at: now,
        })
    }

    fn add_foul(&mut self, foul: Foul) {
        if !self.fouls.iter().any(|f| f.same_as(&foul)) {
            self.fouls.push(foul);
        }
    }

    // A foul leaves the list once it is off screen and either the clock is
    // stopped or it is more than a server second old.
    fn remove_expired_fouls(&mut self, now: Instant) {
        let time = self.time;
        let stopped = self.is_time_stopped();
        self.fouls
            .retain(|f| f.is_displayed(now) || ((time - f.time).abs() < 1.0 && !stopped));
    }

    /// Whether the game clock is halted (before kick off or after the game).
    pub fn is_time_stopped(&self) -> bool {
        matches!(
            self.play_mode.as_deref(),
            Some(play_mode::BEFORE_KICK_OFF) | Some(play_mode::GAME_OVER)
        )
    }

    /// Whether at least one delta has been applied since the last reset.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn measures(&self) -> &Measures {
        &self.measures
    }

    /// Whether the server ever sent pass mode values.
    pub fn pass_mode_values_reported(&self) -> bool {
        self.pass_mode_values_reported
    }

    pub fn pass_mode_score_wait_left(&self) -> f32 {
        self.pass_mode_score_wait_left
    }

    pub fn pass_mode_score_wait_right(&self) -> f32 {
        self.pass_mode_score_wait_right
    }

    pub fn play_modes(&self) -> &[String] {
        &self.play_modes
    }

    pub fn team_left(&self) -> Option<&str> {
        self.team_left.as_deref()
    }

    pub fn team_right(&self) -> Option<&str> {
        self.team_right.as_deref()
    }

    pub fn score_left(&self) -> i32 {
        self.score_left
    }

    pub fn score_right(&self) -> i32 {
        self.score_right
    }

    pub fn play_mode(&self) -> Option<&str> {
        self.play_mode.as_deref()
    }

    /// Whether the last delta changed the play mode. Reading clears the flag.
    pub fn take_play_mode_changed(&mut self) -> bool {
        std::mem::take(&mut self.play_mode_changed)
    }

    /// The most recent play mode transitions, oldest first.
    pub fn play_mode_history(&self) -> &[PlayModeChange] {
        &self.play_mode_history
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn half(&self) -> i32 {
        self.half
    }

    pub fn fouls(&self) -> &[Foul] {
        &self.fouls
    }
}

fn text<'a>(field: &str, expr: &'a Expression, index: usize) -> Result<&'a str, StateError> {
    expr.atom(index).ok_or_else(|| StateError::MissingValue {
        field: field.to_string(),
    })
}

fn value<T: FromStr>(field: &str, expr: &Expression, index: usize) -> Result<T, StateError> {
    let raw = text(field, expr, index)?;
    raw.parse().map_err(|_| StateError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}
