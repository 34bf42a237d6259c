//! Play command - replay a recorded log on the console
//!
//! Prints team names, halves, scores and play mode transitions as the log
//! plays, then a summary with the goals the analyzer found.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use sparkview_core::config::ReaderStrategy;
use sparkview_core::dispatch::lock_world;
use sparkview_core::{
    Config, LogPlayer, PlaybackSettings, PlayerEvent, PlayerState, SceneSkeleton, World,
};
use tracing::{debug, info};

use crate::report::Transitions;

/// Log reader selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Random access for plain files, windowed for archives
    Auto,
    /// Reopen and read forward for every backward seek
    Sequential,
    /// Keep a window of recent frames in memory
    Windowed,
    /// Index every frame offset (plain files only)
    Random,
}

impl From<Strategy> for ReaderStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Auto => ReaderStrategy::Auto,
            Strategy::Sequential => ReaderStrategy::Sequential,
            Strategy::Windowed => ReaderStrategy::Windowed,
            Strategy::Random => ReaderStrategy::Random,
        }
    }
}

/// Arguments for the play command
#[derive(Args)]
pub struct PlayArgs {
    /// Log file (.log, .gz, .bz2, .tar.bz2 or .zip)
    pub log: PathBuf,

    /// Playback speed in multiples of real time; negative plays backward
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub speed: f64,

    /// Log reader (defaults to the configured one)
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Frame to start playing from
    #[arg(long)]
    pub start: Option<usize>,

    /// Skip the background scan for goals and frame count
    #[arg(long)]
    pub no_analyze: bool,
}

/// Execute the play command
pub fn execute(args: PlayArgs, config: &Config) -> Result<()> {
    if args.speed == 0.0 {
        bail!("Speed must be non-zero");
    }
    if args.speed < 0.0 && args.start.is_none() {
        bail!("Playing backward needs a --start frame");
    }

    let mut config = config.clone();
    if let Some(strategy) = args.strategy {
        config.logs.strategy = strategy.into();
    }
    let settings = PlaybackSettings {
        analyze: !args.no_analyze,
        autoplay: args.start.is_none(),
        ..PlaybackSettings::from_config(&config)
    };

    let world = Arc::new(Mutex::new(World::new(Box::new(SceneSkeleton::new()))));
    let mut player = LogPlayer::new(world.clone(), settings);
    player.set_speed(args.speed);
    let (tx, rx) = mpsc::channel();
    player.subscribe(tx);

    println!("Playing {}", args.log.display());
    player.open(&args.log)?;
    if let Some(start) = args.start {
        player.seek(start);
        player.resume();
    }

    let mut transitions = Transitions::new();
    let mut started = false;
    for event in rx.iter() {
        match event {
            PlayerEvent::FrameChanged { frame, .. } => {
                for line in transitions.observe(&lock_world(&world).game_state) {
                    println!("{}", line);
                }
                debug!("frame {}", frame);
            }
            PlayerEvent::StateChanged(PlayerState::Playing) => started = true,
            PlayerEvent::StateChanged(PlayerState::Paused) if started => break,
            PlayerEvent::StepSizeChanged(step) => info!("{} s per frame", step),
            PlayerEvent::AnalysisFinished { frame_count } => {
                info!("analysis finished: {} frames", frame_count)
            }
            PlayerEvent::Error(e) => bail!("Playback failed: {}", e),
            _ => {}
        }
    }

    print_summary(&player);
    Ok(())
}

fn print_summary(player: &LogPlayer) {
    println!();
    println!(
        "Stopped at frame {} of {}{}",
        player.frame() + 1,
        player.frame_count(),
        if player.is_analyzed() { "" } else { " (estimated)" }
    );
    let goals = player.goals();
    if !goals.is_empty() {
        println!("Goals:");
        for goal in &goals {
            println!("  frame {}: {}", goal.frame, goal.scoring_team.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: PlayArgs,
    }

    #[test]
    fn test_parse_negative_speed() {
        let cli = Cli::parse_from(["play", "match.log", "--speed", "-2.5", "--start", "40"]);
        assert_eq!(cli.args.speed, -2.5);
        assert_eq!(cli.args.start, Some(40));
        assert!(!cli.args.no_analyze);
    }

    #[test]
    fn test_parse_strategy() {
        let cli = Cli::parse_from(["play", "match.log.gz", "--strategy", "windowed"]);
        assert_eq!(cli.args.strategy, Some(Strategy::Windowed));
        assert_eq!(
            ReaderStrategy::from(Strategy::Random),
            ReaderStrategy::Random
        );
    }

    #[test]
    fn test_rejects_zero_speed() {
        let cli = Cli::parse_from(["play", "match.log", "--speed", "0"]);
        let err = execute(cli.args, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn test_backward_needs_start() {
        let cli = Cli::parse_from(["play", "match.log", "--speed", "-1"]);
        let err = execute(cli.args, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("--start"));
    }

    #[test]
    fn test_plays_log_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match.log");
        let full = "(RSG 0 1)((nd TRF (SLT 1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1))(nd Light))";
        let diff = "(RDS 0 1)((nd (SLT 1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1))(nd))";
        let log = format!(
            "((play_modes BeforeKickOff PlayOn)(play_mode 1)(team_left Alpha)(team_right Beta)\
             (time 0)(half 1)(score_left 0)(score_right 0)){full}\n\
             ((time 0.2)){diff}\n\
             ((time 0.4)(score_left 1)){diff}\n"
        );
        std::fs::write(&path, log).unwrap();

        let path = path.display().to_string();
        let cli = Cli::parse_from(["play", path.as_str(), "--speed", "10"]);
        execute(cli.args, &Config::default()).unwrap();
    }

    #[test]
    fn test_missing_log_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.log").display().to_string();
        let cli = Cli::parse_from(["play", path.as_str(), "--no-analyze"]);
        assert!(execute(cli.args, &Config::default()).is_err());
    }
}
