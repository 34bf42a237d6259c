//! Console reporting of game state transitions

use sparkview_core::GameState;

/// Remembers what was last reported and describes what changed since.
#[derive(Debug, Default)]
pub struct Transitions {
    teams: Option<(String, String)>,
    half: Option<i32>,
    score: Option<(i32, i32)>,
    play_mode: Option<String>,
}

impl Transitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything reported so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One line per change since the last call, oldest concern first.
    pub fn observe(&mut self, state: &GameState) -> Vec<String> {
        let mut lines = Vec::new();
        if !state.is_initialized() {
            return lines;
        }
        let time = format_time(state.time());

        let teams = (
            state.team_left().unwrap_or("<left>").to_string(),
            state.team_right().unwrap_or("<right>").to_string(),
        );
        if self.teams.as_ref() != Some(&teams) {
            lines.push(format!("[{}] {} vs {}", time, teams.0, teams.1));
            self.teams = Some(teams);
        }

        if self.half != Some(state.half()) {
            lines.push(format!("[{}] half {}", time, state.half()));
            self.half = Some(state.half());
        }

        let score = (state.score_left(), state.score_right());
        if self.score != Some(score) {
            lines.push(format!("[{}] score {}:{}", time, score.0, score.1));
            self.score = Some(score);
        }

        if let Some(mode) = state.play_mode()
            && self.play_mode.as_deref() != Some(mode)
        {
            lines.push(format!("[{}] {}", time, mode));
            self.play_mode = Some(mode.to_string());
        }

        lines
    }
}

/// Server time as `mm:ss.s`.
pub fn format_time(seconds: f32) -> String {
    let tenths = (seconds.max(0.0) * 10.0).round() as u64;
    format!("{:02}:{:02}.{}", tenths / 600, tenths / 10 % 60, tenths % 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparkview_shared::parse;

    fn apply(state: &mut GameState, delta: &str) {
        let exprs = parse(delta).unwrap().unwrap();
        state.apply_state_delta(&exprs[0]);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00.0");
        assert_eq!(format_time(75.34), "01:15.3");
        assert_eq!(format_time(599.96), "10:00.0");
        assert_eq!(format_time(-2.0), "00:00.0");
    }

    #[test]
    fn test_uninitialized_state_reports_nothing() {
        let mut transitions = Transitions::new();
        assert!(transitions.observe(&GameState::new()).is_empty());
    }

    #[test]
    fn test_reports_only_changes() {
        let mut state = GameState::new();
        let mut transitions = Transitions::new();
        apply(
            &mut state,
            "((time 0)(half 1)(team_left Alpha)(team_right Beta)(score_left 0)(score_right 0)\
             (play_modes BeforeKickOff KickOff_Left PlayOn)(play_mode 0))",
        );
        assert_eq!(
            transitions.observe(&state),
            vec![
                "[00:00.0] Alpha vs Beta",
                "[00:00.0] half 1",
                "[00:00.0] score 0:0",
                "[00:00.0] BeforeKickOff",
            ]
        );

        apply(&mut state, "((time 0.2))");
        assert!(transitions.observe(&state).is_empty());

        apply(&mut state, "((time 42.5)(play_mode 2))");
        assert_eq!(transitions.observe(&state), vec!["[00:42.5] PlayOn"]);

        apply(&mut state, "((time 61)(score_right 1)(play_mode 1))");
        assert_eq!(
            transitions.observe(&state),
            vec!["[01:01.0] score 0:1", "[01:01.0] KickOff_Left"]
        );
    }

    #[test]
    fn test_reset_reports_everything_again() {
        let mut state = GameState::new();
        let mut transitions = Transitions::new();
        apply(&mut state, "((time 3)(half 2)(score_left 2))");
        assert_eq!(transitions.observe(&state).len(), 3);
        assert!(transitions.observe(&state).is_empty());

        transitions.reset();
        assert_eq!(transitions.observe(&state).len(), 3);
    }
}
