//! Sparkview Core - SimSpark monitor client
//!
//! Reconstructs a frame-by-frame soccer world from the monitor protocol,
//! either live from a server or replayed from recorded logs.
//!
//! # Architecture
//!
//! - [`MessageDispatcher`] - parses messages and applies them to a shared [`World`]
//! - [`GameState`] - teams, scores, play mode, rules and fouls
//! - [`logfile`] - sequential, windowed and random access log readers
//! - [`LogAnalyzer`] - background scan for step size, goals and frame count
//! - [`LogPlayer`] - threaded, variable-speed log playback
//! - [`ServerConnection`] - live client with optional mirror recording
//! - [`DrawCommandReceiver`] - UDP listener for agent draw commands

pub mod analyzer;
pub mod config;
pub mod dispatch;
pub mod draw_receiver;
pub mod game_state;
#[cfg(test)]
mod integration;
pub mod live;
pub mod logfile;
pub mod playback;
pub mod recorder;
pub mod scene;
#[cfg(test)]
pub mod test_utils;

pub use analyzer::{AnalyzerEvent, AnalyzerSettings, Goal, LogAnalyzer};
pub use config::Config;
pub use dispatch::{ChangeSet, DispatchError, MessageDispatcher, World};
pub use draw_receiver::{DrawCommandReceiver, DrawReceiverError};
pub use game_state::{ChangeCounts, ChangeFlags, Foul, GameState, GameStateEvent, StateError};
pub use live::{ConnectionError, ConnectionEvent, ConnectionSettings, ServerConnection};
pub use logfile::{LogError, LogOptions, LogReader, LogStrategy, open_log};
pub use playback::{LogPlayer, PlaybackError, PlaybackSettings, PlayerEvent, PlayerState};
pub use recorder::LogRecorder;
pub use scene::{NullScene, SceneError, SceneGraph, SceneSkeleton};
