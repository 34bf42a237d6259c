//! Analyze command - scan a log without playing it

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Result, bail};
use clap::Args;
use sparkview_core::{AnalyzerEvent, AnalyzerSettings, Config, LogAnalyzer};

use crate::report::format_time;

/// Arguments for the analyze command
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Log file (.log, .gz, .bz2, .tar.bz2 or .zip)
    pub log: PathBuf,

    /// Seconds of lead-in before each goal (defaults to the configured value)
    #[arg(long)]
    pub goal_window: Option<f32>,
}

/// Execute the analyze command
pub fn execute(args: AnalyzeArgs, config: &Config) -> Result<()> {
    if !args.log.is_file() {
        bail!("Log not found: {}", args.log.display());
    }

    let mut settings = AnalyzerSettings::from_config(config);
    if let Some(window) = args.goal_window {
        settings.goal_window_seconds = window;
    }

    println!("Analyzing {}...", args.log.display());
    let (tx, rx) = mpsc::channel();
    let analyzer = LogAnalyzer::spawn(&args.log, settings, tx);

    let mut step_size = None;
    let mut goals = 0;
    let mut frame_count = None;
    for event in rx.iter() {
        match event {
            AnalyzerEvent::StepSizeFound {
                step_size: step,
                estimated_frames,
            } => {
                step_size = Some(step);
                match estimated_frames {
                    Some(frames) => println!("  Step size: {} s (about {} frames)", step, frames),
                    None => println!("  Step size: {} s", step),
                }
            }
            AnalyzerEvent::GoalFound(goal) => {
                goals += 1;
                let at = format_time(goal.frame as f32 * step_size.unwrap_or(0.0));
                println!(
                    "  Goal {}: {} at frame {} ({}), watch from frame {}",
                    goals,
                    goal.scoring_team.as_str(),
                    goal.frame,
                    at,
                    goal.view_frame
                );
            }
            AnalyzerEvent::Finished { frame_count: count } => frame_count = Some(count),
        }
    }
    analyzer.join();

    let Some(frame_count) = frame_count else {
        bail!("Failed to analyze {}", args.log.display());
    };
    println!("  Frames: {}", frame_count);
    if step_size.is_none() {
        println!("  Step size: unknown (no time advance found)");
    }
    if goals == 0 {
        println!("  No goals");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_log_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = AnalyzeArgs {
            log: dir.path().join("missing.log"),
            goal_window: None,
        };
        let err = execute(args, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_analyzes_plain_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("match.log");
        let lines: Vec<String> = (0..5)
            .map(|i| {
                format!(
                    "((time {})(score_left {}))(RDS 0 1)((nd))",
                    i as f32 * 0.2,
                    i / 3
                )
            })
            .collect();
        std::fs::write(&log, lines.join("\n")).unwrap();

        let args = AnalyzeArgs {
            log,
            goal_window: Some(0.2),
        };
        execute(args, &Config::default()).unwrap();
    }
}
