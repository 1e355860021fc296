//! Producer workers: play episodes against an environment and hand them to
//! the agent for training.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use a3c_core::EpisodeBuilder;
use a3c_rl::Agent;

use crate::env::Environment;

/// Episodes between progress log lines
const PROGRESS_INTERVAL: usize = 25;

/// What a worker did before it stopped
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerReport {
    pub worker: usize,
    pub episodes: usize,
    pub total_steps: usize,
    pub best_length: usize,
}

impl WorkerReport {
    pub fn mean_length(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.total_steps as f64 / self.episodes as f64
        }
    }
}

/// Worker settings
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub episodes: usize,
    pub gamma: f64,
    /// Queue finished episodes for training
    pub store: bool,
}

/// Play one episode to termination, sampling actions from the agent
pub fn play_episode<E: Environment>(agent: &Agent, env: &mut E) -> Result<EpisodeBuilder> {
    let mut episode = EpisodeBuilder::new();
    let mut state = env.reset();

    loop {
        let action = agent.choose_action(&state)?;
        let step = env.step(action)?;
        episode.record(state, action, step.reward, step.state);
        state = step.state;

        if step.done {
            return Ok(episode);
        }
    }
}

/// Play `options.episodes` episodes, or fewer if `cancel` is set
pub fn run_worker<E: Environment>(
    id: usize,
    agent: &Agent,
    mut env: E,
    options: WorkerOptions,
    cancel: &AtomicBool,
) -> Result<WorkerReport> {
    let mut report = WorkerReport {
        worker: id,
        ..WorkerReport::default()
    };
    if env.action_count() != agent.action_count() {
        bail!(
            "environment has {} actions but the agent was built for {}",
            env.action_count(),
            agent.action_count()
        );
    }
    let mut recent_steps = 0;

    while report.episodes < options.episodes && !cancel.load(Ordering::Relaxed) {
        let episode = play_episode(agent, &mut env)?;
        let length = episode.len();

        report.episodes += 1;
        report.total_steps += length;
        report.best_length = report.best_length.max(length);
        recent_steps += length;
        debug!("Worker {} episode {} length {}", id, report.episodes, length);

        if options.store {
            let episode = episode
                .finish(options.gamma)
                .with_context(|| format!("worker {id} produced an invalid episode"))?;
            agent.store_episode(episode)?;
        }

        if report.episodes % PROGRESS_INTERVAL == 0 {
            info!(
                "Worker {}: {} episodes, mean length of last {}: {:.1}",
                id,
                report.episodes,
                PROGRESS_INTERVAL,
                recent_steps as f64 / PROGRESS_INTERVAL as f64
            );
            recent_steps = 0;
        }
    }

    Ok(report)
}
