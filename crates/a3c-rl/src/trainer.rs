//! Background trainer
//!
//! Runs [`Agent::train_network`] in a loop on the blocking thread pool until
//! asked to stop. Cancellation is cooperative: the stop signal is checked at
//! the top of every iteration, so a step already in progress completes.
//! Dropping the [`TrainerHandle`] counts as a stop request.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use a3c_core::{A3cError, Result};

use crate::agent::{Agent, TrainingSummary};

/// Work done by a trainer between start and stop
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainerReport {
    /// Loop iterations, including those that found no episode
    pub iterations: u64,
    /// Iterations that trained on an episode
    pub episodes_trained: u64,
    pub last_summary: Option<TrainingSummary>,
}

/// Spawns the background training loop
pub struct Trainer;

impl Trainer {
    /// Start training on `agent`. Must be called within a tokio runtime.
    pub fn spawn(agent: Arc<Agent>) -> TrainerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::task::spawn_blocking(move || run(&agent, &stop_rx));

        info!("Background trainer started");
        TrainerHandle { stop_tx, task }
    }
}

/// Set explicitly, or implied by the handle having been dropped
fn stop_requested(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

fn run(agent: &Agent, stop: &watch::Receiver<bool>) -> Result<TrainerReport> {
    let mut report = TrainerReport::default();

    while !stop_requested(stop) {
        std::thread::yield_now();
        report.iterations += 1;

        match agent.train_network() {
            Ok(Some(summary)) => {
                report.episodes_trained += 1;
                report.last_summary = Some(summary);
            }
            Ok(None) => {}
            Err(e) => {
                error!("Trainer stopping on error: {}", e);
                return Err(e);
            }
        }
    }

    info!(
        "Background trainer stopped after {} iterations ({} episodes trained)",
        report.iterations, report.episodes_trained
    );
    Ok(report)
}

/// Handle to a running trainer
pub struct TrainerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Result<TrainerReport>>,
}

impl TrainerHandle {
    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// True once the loop has exited, either on request or on error
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(self) -> Result<TrainerReport> {
        self.request_stop();
        self.join().await
    }

    /// Wait for the loop to exit without signalling it
    pub async fn join(self) -> Result<TrainerReport> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(A3cError::Trainer(format!("trainer task failed: {e}"))),
        }
    }
}
