//! Train the agent with producer workers and the background trainer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use a3c_rl::{Agent, Trainer, TrainerHandle};

use crate::config::Config;
use crate::env::CartPole;
use crate::worker::{run_worker, WorkerOptions, WorkerReport};

/// How often the drain loop checks the episode queue
const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Number of producer workers (overrides run.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Episodes per worker (overrides run.episodes_per_worker)
    #[arg(short, long)]
    pub episodes: Option<usize>,
}

pub async fn run(args: TrainArgs, config: Config) -> Result<()> {
    let workers = args.workers.unwrap_or(config.run.workers).max(1);
    let episodes = args.episodes.unwrap_or(config.run.episodes_per_worker);

    let agent = Arc::new(Agent::new(config.agent.clone()).context("Failed to create agent")?);
    info!(
        "Training with {} workers x {} episodes, checkpoint dir {}",
        workers,
        episodes,
        config.agent.checkpoint_dir.display()
    );

    let trainer = Trainer::spawn(agent.clone());
    let cancel = Arc::new(AtomicBool::new(false));
    let signal_task = tokio::spawn(cancel_on_signal(cancel.clone()));

    let options = WorkerOptions {
        episodes,
        gamma: config.run.gamma,
        store: true,
    };
    let mut tasks = JoinSet::new();
    for id in 0..workers {
        let agent = agent.clone();
        let cancel = cancel.clone();
        let env = match config.agent.seed {
            Some(seed) => CartPole::with_seed(config.run.max_episode_steps, seed.wrapping_add(id as u64)),
            None => CartPole::new(config.run.max_episode_steps),
        };
        tasks.spawn_blocking(move || run_worker(id, &agent, env, options, &cancel));
    }

    let mut reports = Vec::with_capacity(workers);
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(anyhow::Error::from).and_then(|result| result) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!("Worker failed: {:#}", e);
                cancel.store(true, Ordering::Relaxed);
                failure.get_or_insert(e);
            }
        }
    }

    let drained = if cancel.load(Ordering::Relaxed) {
        Ok(())
    } else {
        drain_queue(&agent, &trainer, &cancel).await
    };
    signal_task.abort();

    let trainer_report = trainer.stop().await.context("Background trainer failed")?;
    if let Some(e) = failure {
        return Err(e);
    }
    drained?;

    reports.sort_by_key(|r| r.worker);
    print_summary(&reports);
    let stats = agent.stats()?;
    println!(
        "\nTrainer: {} episodes trained in {} iterations, {} total steps",
        trainer_report.episodes_trained, trainer_report.iterations, stats.train_steps
    );
    match stats.queue_capacity {
        Some(capacity) => println!(
            "Queue: capacity {}, {} episodes dropped",
            capacity, stats.episodes_dropped
        ),
        None => println!("Queue: unbounded"),
    }
    if let Some(summary) = trainer_report.last_summary {
        println!(
            "Last episode: len={} reward={:.3} loss={:.5}",
            summary.episode_len, summary.episode_reward, summary.loss
        );
    }

    Ok(())
}

/// Let the trainer consume what the workers queued
async fn drain_queue(agent: &Agent, trainer: &TrainerHandle, cancel: &AtomicBool) -> Result<()> {
    let pending = agent.queue_len()?;
    if pending > 0 {
        info!("Workers finished, training on {} queued episodes", pending);
    }

    while agent.queue_len()? > 0 && !trainer.is_finished() && !cancel.load(Ordering::Relaxed) {
        tokio::time::sleep(DRAIN_POLL).await;
    }
    Ok(())
}

async fn cancel_on_signal(cancel: Arc<AtomicBool>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupted, stopping workers");
            cancel.store(true, Ordering::Relaxed);
        }
        Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
    }
}

fn print_summary(reports: &[WorkerReport]) {
    println!("Worker  Episodes  Mean length  Best");
    println!("------  --------  -----------  ----");
    for report in reports {
        println!(
            "{:>6}  {:>8}  {:>11.1}  {:>4}",
            report.worker,
            report.episodes,
            report.mean_length(),
            report.best_length
        );
    }
}
