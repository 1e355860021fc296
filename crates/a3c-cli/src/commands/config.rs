//! Configuration management commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default a3c.toml in the current directory
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommands {
    /// Whether the command reads the effective configuration
    pub fn needs_config(&self) -> bool {
        matches!(self, Self::Show)
    }
}

pub async fn run(cmd: ConfigCommands, config: Config) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(&config),
        ConfigCommands::Init { force } => init(Path::new("a3c.toml"), force),
    }
}

fn show(config: &Config) -> Result<()> {
    println!("{}", config.to_toml()?);
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    std::fs::write(path, Config::default().to_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration file created: {}", path.display());
    Ok(())
}
