//! Sparkview CLI - monitor for SimSpark soccer servers and logs
//!
//! # Commands
//!
//! - `sparkview play` - Replay a recorded log, printing scores and play modes
//! - `sparkview analyze` - Scan a log for its step size, goals and length
//! - `sparkview connect` - Follow a live server, optionally recording it
//! - `sparkview config` - Show or initialize the configuration file
//!
//! # Usage
//!
//! ```bash
//! # Replay a log at double speed
//! sparkview play match.log.gz --speed 2
//!
//! # Play backward from frame 500
//! sparkview play match.log --start 500 --speed -1
//!
//! # Follow a local server and mirror the session to ./logfiles
//! sparkview connect --record logfiles
//! ```
//!
//! Log output is controlled with `RUST_LOG` (default: `info`).

mod analyze;
mod config;
mod connect;
mod play;
mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sparkview_core::Config;

/// Sparkview CLI - monitor for SimSpark soccer servers and logs
#[derive(Parser)]
#[command(name = "sparkview")]
#[command(about = "Monitor for SimSpark soccer servers and logs")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded log
    Play(play::PlayArgs),

    /// Scan a log for its step size, goals and frame count
    Analyze(analyze::AnalyzeArgs),

    /// Follow a live server
    Connect(connect::ConnectArgs),

    /// Show or initialize the configuration file
    Config(config::ConfigArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play(args) => play::execute(args, &config),
        Commands::Analyze(args) => analyze::execute(args, &config),
        Commands::Connect(args) => connect::execute(args, &config),
        Commands::Config(args) => config::execute(args, &config, cli.config.as_deref()),
    }
}

/// An existing explicit config file must parse; anything else falls back to defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) if path.exists() => sparkview_core::config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        Some(path) => {
            tracing::info!("{} not found, using defaults", path.display());
            Ok(Config::default())
        }
        None => Ok(sparkview_core::config::load()),
    }
}
