//! Config command - show or initialize the configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use sparkview_core::Config;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Print where the configuration file lives and exit
    #[arg(long)]
    pub path: bool,

    /// Write the effective configuration back to the file
    #[arg(long)]
    pub save: bool,
}

/// Execute the config command
pub fn execute(args: ConfigArgs, config: &Config, explicit: Option<&Path>) -> Result<()> {
    let location = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => sparkview_core::config::config_path(),
    };

    if args.path {
        match &location {
            Some(path) => println!("{}", path.display()),
            None => println!("No configuration directory available"),
        }
        return Ok(());
    }

    if args.save {
        let path: PathBuf = location.context("No configuration directory available")?;
        sparkview_core::config::save_to(config, &path)
            .with_context(|| format!("Failed to save config to {}", path.display()))?;
        println!("Saved {}", path.display());
        return Ok(());
    }

    let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
    print!("{}", text);
    Ok(())
}
