//! Monitor protocol vocabulary
//!
//! Field names carried in the game-state expression (expression 0 of every
//! monitor message), the standard play modes, and the small enums the
//! protocol encodes as integers.

// === Measurements and rules ===

pub const FIELD_LENGTH: &str = "FieldLength";
pub const FIELD_WIDTH: &str = "FieldWidth";
pub const FIELD_HEIGHT: &str = "FieldHeight";
pub const GOAL_WIDTH: &str = "GoalWidth";
pub const GOAL_DEPTH: &str = "GoalDepth";
pub const GOAL_HEIGHT: &str = "GoalHeight";
pub const FREE_KICK_DISTANCE: &str = "FreeKickDistance";
pub const WAIT_BEFORE_KICK_OFF: &str = "WaitBeforeKickOff";
pub const AGENT_RADIUS: &str = "AgentRadius";
pub const BALL_RADIUS: &str = "BallRadius";
pub const BALL_MASS: &str = "BallMass";
pub const RULE_GOAL_PAUSE_TIME: &str = "RuleGoalPauseTime";
pub const RULE_KICK_IN_PAUSE_TIME: &str = "RuleKickInPauseTime";
pub const RULE_HALF_TIME: &str = "RuleHalfTime";
pub const PASS_MODE_MIN_OPP_BALL_DIST: &str = "PassModeMinOppBallDist";
pub const PASS_MODE_DURATION: &str = "PassModeDuration";

// === Play state ===

pub const PLAY_MODES: &str = "play_modes";
pub const TEAM_LEFT: &str = "team_left";
pub const TEAM_RIGHT: &str = "team_right";
pub const SCORE_LEFT: &str = "score_left";
pub const SCORE_RIGHT: &str = "score_right";
pub const PLAY_MODE: &str = "play_mode";

// === Time ===

pub const TIME: &str = "time";
pub const HALF: &str = "half";
pub const PASS_MODE_SCORE_WAIT_LEFT: &str = "pass_mode_score_wait_left";
pub const PASS_MODE_SCORE_WAIT_RIGHT: &str = "pass_mode_score_wait_right";

// === Fouls ===

pub const FOUL: &str = "foul";

/// Standard play mode names sent in the `play_modes` list.
pub mod play_mode {
    pub const BEFORE_KICK_OFF: &str = "BeforeKickOff";
    pub const KICK_OFF_LEFT: &str = "KickOff_Left";
    pub const KICK_OFF_RIGHT: &str = "KickOff_Right";
    pub const PLAY_ON: &str = "PlayOn";
    pub const KICK_IN_LEFT: &str = "KickIn_Left";
    pub const KICK_IN_RIGHT: &str = "KickIn_Right";
    pub const CORNER_KICK_LEFT: &str = "corner_kick_left";
    pub const CORNER_KICK_RIGHT: &str = "corner_kick_right";
    pub const GOAL_KICK_LEFT: &str = "goal_kick_left";
    pub const GOAL_KICK_RIGHT: &str = "goal_kick_right";
    pub const OFFSIDE_LEFT: &str = "offside_left";
    pub const OFFSIDE_RIGHT: &str = "offside_right";
    pub const GAME_OVER: &str = "GameOver";
    pub const GOAL_LEFT: &str = "Goal_Left";
    pub const GOAL_RIGHT: &str = "Goal_Right";
    pub const FREE_KICK_LEFT: &str = "free_kick_left";
    pub const FREE_KICK_RIGHT: &str = "free_kick_right";
    pub const DIRECT_FREE_KICK_LEFT: &str = "direct_free_kick_left";
    pub const DIRECT_FREE_KICK_RIGHT: &str = "direct_free_kick_right";
    pub const PASS_LEFT: &str = "pass_left";
    pub const PASS_RIGHT: &str = "pass_right";
}

/// Field side of a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Left,
    Right,
}

impl Team {
    /// Protocol spelling used by control commands (`Left` / `Right`).
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Left => "Left",
            Team::Right => "Right",
        }
    }

    /// Team from the integer encoding used in foul reports (1 = left, 2 = right).
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            1 => Some(Team::Left),
            2 => Some(Team::Right),
            _ => None,
        }
    }
}

/// Foul categories reported by the referee, in protocol index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoulType {
    Crowding,
    Touching,
    IllegalDefence,
    IllegalAttack,
    Incapable,
    KickOff,
    Charging,
    SelfCollision,
    BallHolding,
}

impl FoulType {
    const ALL: [FoulType; 9] = [
        FoulType::Crowding,
        FoulType::Touching,
        FoulType::IllegalDefence,
        FoulType::IllegalAttack,
        FoulType::Incapable,
        FoulType::KickOff,
        FoulType::Charging,
        FoulType::SelfCollision,
        FoulType::BallHolding,
    ];

    /// Foul type for the protocol index, or `None` if out of range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human readable description.
    pub fn description(self) -> &'static str {
        match self {
            FoulType::Crowding => "crowding",
            FoulType::Touching => "touching",
            FoulType::IllegalDefence => "illegal defence",
            FoulType::IllegalAttack => "illegal attack",
            FoulType::Incapable => "incapable",
            FoulType::KickOff => "illegal kickoff",
            FoulType::Charging => "charging",
            FoulType::SelfCollision => "self collision",
            FoulType::BallHolding => "ball holding",
        }
    }
}

impl std::fmt::Display for FoulType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foul_type_index() {
        assert_eq!(FoulType::from_index(0), Some(FoulType::Crowding));
        assert_eq!(FoulType::from_index(8), Some(FoulType::BallHolding));
        assert_eq!(FoulType::from_index(9), None);
        assert_eq!(FoulType::KickOff.to_string(), "illegal kickoff");
    }

    #[test]
    fn test_team_index() {
        assert_eq!(Team::from_index(1), Some(Team::Left));
        assert_eq!(Team::from_index(2), Some(Team::Right));
        assert_eq!(Team::from_index(0), None);
        assert_eq!(Team::Right.as_str(), "Right");
    }
}
