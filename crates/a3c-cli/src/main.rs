//! a3c - train and evaluate the cart-pole actor-critic agent
//!
//! `a3c train` runs producer workers against the cart-pole environment while
//! a background trainer consumes their episodes. `a3c evaluate` plays with the
//! latest checkpoint without training.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod env;
mod worker;

use commands::{evaluate, train};

#[derive(Parser)]
#[command(name = "a3c")]
#[command(author, version, about = "A3C cart-pole actor-critic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true, env = "A3C_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train with producer workers and the background trainer
    Train(train::TrainArgs),

    /// Play episodes with the latest checkpoint
    Evaluate(evaluate::EvaluateArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

impl Commands {
    fn needs_config(&self) -> bool {
        match self {
            Self::Config(cmd) => cmd.needs_config(),
            Self::Train(_) | Self::Evaluate(_) => true,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.command.needs_config() {
        config::Config::load(cli.config.as_deref())?
    } else {
        config::Config::default()
    };

    // Initialize logging based on verbosity
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.run.log_level.as_str()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("a3c={log_level},a3c_rl={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Train(args) => train::run(args, config).await,
        Commands::Evaluate(args) => evaluate::run(args, config).await,
        Commands::Config(cmd) => commands::config::run(cmd, config).await,
    }
}
