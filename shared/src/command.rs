//! Outbound control messages
//!
//! Commands a monitor may send to the simulator over the live connection.
//! Each renders to a single s-expression. Numbers always use two decimals
//! and `.` as the separator.

use std::fmt;

use crate::protocol::{Team, play_mode};

/// A 3-component value with the protocol's fixed two-decimal rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {:.2} {:.2}", self.x, self.y, self.z)
    }
}

/// A control message for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Initialise the monitor connection
    Init,
    /// Kick off for the given team
    KickOff(Team),
    /// Drop the ball at its current position
    DropBall,
    /// Switch to a named play mode
    PlayMode(String),
    /// Move an agent
    MoveAgent { team: Team, unum: u32, pos: Vec3 },
    /// Place the ball with a velocity
    MoveBall { pos: Vec3, vel: Vec3 },
    /// Reset the game clock to zero
    ResetTime,
    /// Ask for a full state description
    RequestFullState,
    /// Stop the simulator
    KillSim,
}

impl ControlCommand {
    /// Free kick for the given team.
    pub fn free_kick(team: Team) -> Self {
        let mode = match team {
            Team::Left => play_mode::FREE_KICK_LEFT,
            Team::Right => play_mode::FREE_KICK_RIGHT,
        };
        ControlCommand::PlayMode(mode.to_string())
    }

    /// Direct free kick for the given team.
    pub fn direct_free_kick(team: Team) -> Self {
        let mode = match team {
            Team::Left => play_mode::DIRECT_FREE_KICK_LEFT,
            Team::Right => play_mode::DIRECT_FREE_KICK_RIGHT,
        };
        ControlCommand::PlayMode(mode.to_string())
    }

    /// Place the ball at rest.
    pub fn place_ball(pos: Vec3) -> Self {
        ControlCommand::MoveBall {
            pos,
            vel: Vec3::new(0.0, 0.0, 0.0),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Init => f.write_str("(init)"),
            ControlCommand::KickOff(team) => write!(f, "(kickOff {})", team.as_str()),
            ControlCommand::DropBall => f.write_str("(dropBall)"),
            ControlCommand::PlayMode(mode) => write!(f, "(playMode {})", mode),
            ControlCommand::MoveAgent { team, unum, pos } => write!(
                f,
                "(agent (team {})(unum {})(pos {}))",
                team.as_str(),
                unum,
                pos
            ),
            ControlCommand::MoveBall { pos, vel } => write!(f, "(ball (pos {})(vel {}))", pos, vel),
            ControlCommand::ResetTime => f.write_str("(time 0)"),
            ControlCommand::RequestFullState => f.write_str("(reqfullstate)"),
            ControlCommand::KillSim => f.write_str("(killsim)"),
        }
    }
}
