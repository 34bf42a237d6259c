//! Configuration management (config.toml)
//!
//! Handles loading, saving, and providing defaults for monitor settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logfile::{LogOptions, LogStrategy};

/// File name of the configuration inside [`config_dir`].
pub const CONFIG_FILE: &str = "config.toml";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Live server connection
    #[serde(default)]
    pub network: NetworkConfig,
    /// Log reading and mirror recording
    #[serde(default)]
    pub logs: LogsConfig,
    /// Log playback timing
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Live server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Server host (default: localhost)
    #[serde(default = "default_host")]
    pub host: String,
    /// Monitor port (default: 3200)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Reconnect after the connection drops (default: true)
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    /// Delay before a reconnect attempt (default: 1000)
    #[serde(default = "default_auto_connect_delay_ms")]
    pub auto_connect_delay_ms: u64,
    /// Pace received messages to one per monitor step (default: false)
    #[serde(default)]
    pub use_buffer: bool,
    /// Seconds between server monitor messages (default: 0.04)
    #[serde(default = "default_monitor_step")]
    pub monitor_step: f32,
    /// Messages held between socket reader and consumer (default: 3000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Listen for agent draw commands over UDP (default: true)
    #[serde(default = "default_true")]
    pub draw_commands: bool,
    /// UDP port for draw commands (default: 32769)
    #[serde(default = "default_draw_port")]
    pub draw_port: u16,
}

/// Which log reader to open logs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReaderStrategy {
    /// Random access for plain files, windowed for archives
    #[default]
    Auto,
    Sequential,
    Windowed,
    Random,
}

/// Log reading and recording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Mirror live sessions to a log file (default: false)
    #[serde(default)]
    pub record_logs: bool,
    /// Directory mirror logs are written to (default: logfiles)
    #[serde(default = "default_logfile_directory")]
    pub logfile_directory: PathBuf,
    /// Frames kept by the windowed reader (default: 200)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Suffix of the log entry inside .tar.bz2 archives (default: sparkmonitor.log)
    #[serde(default = "default_tar_entry_suffix")]
    pub tar_entry_suffix: String,
    /// Reader used for opened logs (default: auto)
    #[serde(default)]
    pub strategy: ReaderStrategy,
}

impl LogsConfig {
    /// The reader strategy with the configured window size.
    pub fn log_strategy(&self) -> LogStrategy {
        match self.strategy {
            ReaderStrategy::Auto => LogStrategy::Auto(self.buffer_size),
            ReaderStrategy::Sequential => LogStrategy::Sequential,
            ReaderStrategy::Windowed => LogStrategy::Windowed(self.buffer_size),
            ReaderStrategy::Random => LogStrategy::RandomAccess,
        }
    }
}

impl Config {
    /// Reader options for logs opened under this configuration.
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            tar_entry_suffix: self.logs.tar_entry_suffix.clone(),
            initial_frame_estimate: self.playback.initial_frame_estimate,
            ..LogOptions::default()
        }
    }
}

/// Playback timing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Frame duration assumed until the analyzer finds one (default: 0.2)
    #[serde(default = "default_seconds_per_frame")]
    pub seconds_per_frame: f32,
    /// Frame duration assumed for logs with draw commands (default: 0.04)
    #[serde(default = "default_draw_command_seconds_per_frame")]
    pub draw_command_seconds_per_frame: f32,
    /// Seconds of lead-in shown before a goal (default: 12)
    #[serde(default = "default_goal_window_seconds")]
    pub goal_window_seconds: f32,
    /// Goals closer than this are skipped when jumping (default: 3)
    #[serde(default = "default_goal_step_threshold_seconds")]
    pub goal_step_threshold_seconds: f32,
    /// Frame count assumed before the end of a log is known (default: 1700)
    #[serde(default = "default_initial_frame_estimate")]
    pub initial_frame_estimate: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    3200
}
fn default_true() -> bool {
    true
}
fn default_auto_connect_delay_ms() -> u64 {
    1000
}
fn default_monitor_step() -> f32 {
    0.04
}
fn default_queue_capacity() -> usize {
    3000
}
fn default_draw_port() -> u16 {
    crate::draw_receiver::DEFAULT_DRAW_PORT
}

fn default_logfile_directory() -> PathBuf {
    PathBuf::from("logfiles")
}
fn default_buffer_size() -> usize {
    200
}
fn default_tar_entry_suffix() -> String {
    "sparkmonitor.log".to_string()
}

fn default_seconds_per_frame() -> f32 {
    0.2
}
fn default_draw_command_seconds_per_frame() -> f32 {
    0.04
}
fn default_goal_window_seconds() -> f32 {
    12.0
}
fn default_goal_step_threshold_seconds() -> f32 {
    3.0
}
fn default_initial_frame_estimate() -> usize {
    1700
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auto_connect: default_true(),
            auto_connect_delay_ms: default_auto_connect_delay_ms(),
            use_buffer: false,
            monitor_step: default_monitor_step(),
            queue_capacity: default_queue_capacity(),
            draw_commands: default_true(),
            draw_port: default_draw_port(),
        }
    }
}

impl NetworkConfig {
    pub fn auto_connect_delay(&self) -> Duration {
        Duration::from_millis(self.auto_connect_delay_ms)
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            record_logs: false,
            logfile_directory: default_logfile_directory(),
            buffer_size: default_buffer_size(),
            tar_entry_suffix: default_tar_entry_suffix(),
            strategy: ReaderStrategy::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seconds_per_frame: default_seconds_per_frame(),
            draw_command_seconds_per_frame: default_draw_command_seconds_per_frame(),
            goal_window_seconds: default_goal_window_seconds(),
            goal_step_threshold_seconds: default_goal_step_threshold_seconds(),
            initial_frame_estimate: default_initial_frame_estimate(),
        }
    }
}

/// Errors loading or saving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\sparkview\config`
/// On macOS: `~/Library/Application Support/org.sparkview.sparkview`
/// On Linux: `~/.config/sparkview`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org.sparkview", "", "sparkview")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Full path of the configuration file, if a config directory exists.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads the configuration from disk.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    config_path()
        .and_then(|path| load_from(&path).ok())
        .unwrap_or_default()
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Saves the configuration to the platform config directory.
///
/// Creates the directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    if let Some(path) = config_path() {
        save_to(config, &path)?;
    }
    Ok(())
}

/// Saves the configuration to a specific file, creating parent directories.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
