//! Play episodes with the current checkpoint without training

use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use a3c_rl::Agent;

use crate::config::Config;
use crate::env::CartPole;
use crate::worker::{run_worker, WorkerOptions};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Episodes to play
    #[arg(short, long, default_value_t = 20)]
    pub episodes: usize,
}

pub async fn run(args: EvaluateArgs, config: Config) -> Result<()> {
    let agent = Agent::new(config.agent.clone()).context("Failed to create agent")?;
    if agent.train_steps() == 0 {
        warn!(
            "No trained checkpoint in {}, evaluating freshly initialized parameters",
            config.agent.checkpoint_dir.display()
        );
    }

    let env = match config.agent.seed {
        Some(seed) => CartPole::with_seed(config.run.max_episode_steps, seed),
        None => CartPole::new(config.run.max_episode_steps),
    };
    let options = WorkerOptions {
        episodes: args.episodes,
        gamma: config.run.gamma,
        store: false,
    };

    let report = tokio::task::spawn_blocking(move || {
        run_worker(0, &agent, env, options, &AtomicBool::new(false))
    })
    .await??;

    println!("Episodes:    {}", report.episodes);
    println!("Mean length: {:.1}", report.mean_length());
    println!("Best length: {}", report.best_length);
    Ok(())
}
