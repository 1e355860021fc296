//! Agent - shared actor-critic network plus the episode stack feeding it
//!
//! Producers call [`Agent::choose_action`] while playing and
//! [`Agent::store_transitions`] once an episode ends. The background trainer
//! calls [`Agent::train_network`], which pops the freshest episode and
//! applies one RMSProp step.
//!
//! Parameters sit behind an `RwLock` with a single writer (the training
//! step). Gradients are computed under the read lock; the write lock is
//! taken only to apply the update, so action selection never observes a
//! half-applied step. When both locks are needed, the optimizer lock is
//! always taken first.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ndarray::Array1;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use a3c_core::{A3cError, Episode, Observation, Result};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::AgentConfig;
use crate::network::{states_to_array, LossWeights, Parameters};
use crate::optimizer::RmsProp;
use crate::stack::EpisodeStack;

/// Multiplier applied to the bootstrapped next-state value.
///
/// A constant blend, not a per-step discount.
pub fn bootstrap_scale() -> f64 {
    8f64.powf(0.95)
}

/// Value estimates for the successor states with the final step forced to
/// zero, since the episode ends there.
pub fn terminal_bootstrap(mut next_values: Array1<f64>) -> Array1<f64> {
    let len = next_values.len();
    if len > 0 {
        next_values[len - 1] = 0.0;
    }
    next_values
}

/// Training targets `r' = r + v * 8^0.95`
pub fn bootstrap_targets(rewards: &Array1<f64>, next_values: &Array1<f64>) -> Array1<f64> {
    rewards + &(next_values * bootstrap_scale())
}

/// Outcome of one training step
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    /// Steps in the trained episode
    pub episode_len: usize,
    /// Sum of the reward labels as stored by the producer
    pub episode_reward: f64,
    /// Sum of the bootstrapped targets
    pub bootstrapped_reward: f64,
    /// Combined loss before the update
    pub loss: f64,
    /// Training steps completed so far, including this one
    pub train_steps: u64,
}

/// Agent statistics
#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub action_count: usize,
    pub train_steps: u64,
    pub queue_len: usize,
    /// `None` when the queue is unbounded
    pub queue_capacity: Option<usize>,
    pub episodes_dropped: u64,
}

/// Actor-critic agent shared between producer workers and the trainer
#[derive(Debug)]
pub struct Agent {
    config: AgentConfig,
    network: RwLock<Parameters>,
    optimizer: Mutex<RmsProp>,
    episodes: EpisodeStack,
    checkpoints: CheckpointStore,
    train_steps: AtomicU64,
}

impl Agent {
    /// Build the network and restore the latest checkpoint if there is one
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let params = Parameters::glorot(config.action_count, &mut rng);

        let agent = Self::build(config, params);
        agent.load_network();

        info!(
            "Agent initialized: {} actions, checkpoint dir {}",
            agent.config.action_count,
            agent.checkpoints.dir().display()
        );
        Ok(agent)
    }

    /// Build an agent around explicit parameters without reading checkpoints
    pub fn with_parameters(config: AgentConfig, params: Parameters) -> Result<Self> {
        config.validate()?;
        if !params.has_shape(config.action_count) {
            return Err(A3cError::Config(format!(
                "parameters do not match a network with {} actions",
                config.action_count
            )));
        }
        Ok(Self::build(config, params))
    }

    fn build(config: AgentConfig, params: Parameters) -> Self {
        let optimizer = RmsProp::new(
            config.action_count,
            config.learning_rate,
            config.rms_decay,
            config.rms_epsilon,
        );
        let episodes = match config.queue_capacity {
            Some(capacity) => EpisodeStack::bounded(capacity),
            None => EpisodeStack::new(),
        };
        let checkpoints = CheckpointStore::new(&config.checkpoint_dir, &config.checkpoint_name);

        Self {
            config,
            network: RwLock::new(params),
            optimizer: Mutex::new(optimizer),
            episodes,
            checkpoints,
            train_steps: AtomicU64::new(0),
        }
    }

    pub fn action_count(&self) -> usize {
        self.config.action_count
    }

    fn read_network(&self) -> Result<RwLockReadGuard<'_, Parameters>> {
        self.network
            .read()
            .map_err(|_| A3cError::Internal("network lock poisoned".to_string()))
    }

    fn write_network(&self) -> Result<RwLockWriteGuard<'_, Parameters>> {
        self.network
            .write()
            .map_err(|_| A3cError::Internal("network lock poisoned".to_string()))
    }

    fn lock_optimizer(&self) -> Result<MutexGuard<'_, RmsProp>> {
        self.optimizer
            .lock()
            .map_err(|_| A3cError::Internal("optimizer lock poisoned".to_string()))
    }

    /// Sample an action from the policy for a single state
    pub fn choose_action(&self, state: &Observation) -> Result<usize> {
        let probs = self.policy(state)?;
        let dist = WeightedIndex::new(probs.iter())
            .map_err(|e| A3cError::Internal(format!("policy is not a distribution: {e}")))?;
        Ok(dist.sample(&mut rand::thread_rng()))
    }

    /// Action probabilities for a single state
    pub fn policy(&self, state: &Observation) -> Result<Array1<f64>> {
        Ok(self.read_network()?.policy(state))
    }

    /// Value estimate for a single state
    pub fn value(&self, state: &Observation) -> Result<f64> {
        Ok(self.read_network()?.value(state))
    }

    /// Copy of the current parameters
    pub fn parameters(&self) -> Result<Parameters> {
        Ok(self.read_network()?.clone())
    }

    /// Queue a finished episode for training
    pub fn store_transitions(
        &self,
        states_before: Vec<Observation>,
        actions: Vec<usize>,
        states_after: Vec<Observation>,
        discounted_rewards: Vec<f64>,
    ) -> Result<()> {
        let episode = Episode::new(states_before, actions, states_after, discounted_rewards)?;
        self.store_episode(episode)
    }

    /// Queue an already assembled episode
    pub fn store_episode(&self, episode: Episode) -> Result<()> {
        self.check_actions(&episode)?;
        self.episodes.push(episode)
    }

    fn check_actions(&self, episode: &Episode) -> Result<()> {
        if episode.max_action() >= self.config.action_count {
            return Err(A3cError::InvalidEpisode(format!(
                "action {} out of range for {} actions",
                episode.max_action(),
                self.config.action_count
            )));
        }
        Ok(())
    }

    /// Episodes waiting for the trainer
    pub fn queue_len(&self) -> Result<usize> {
        self.episodes.len()
    }

    /// Completed training steps, including those restored from a checkpoint
    pub fn train_steps(&self) -> u64 {
        self.train_steps.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> Result<AgentStats> {
        Ok(AgentStats {
            action_count: self.config.action_count,
            train_steps: self.train_steps(),
            queue_len: self.episodes.len()?,
            queue_capacity: self.episodes.capacity(),
            episodes_dropped: self.episodes.dropped(),
        })
    }

    /// Train on the most recently stored episode.
    ///
    /// Returns `Ok(None)` without touching parameters or the checkpoint when
    /// no episode is queued.
    pub fn train_network(&self) -> Result<Option<TrainingSummary>> {
        let Some(episode) = self.episodes.pop()? else {
            return Ok(None);
        };
        self.check_actions(&episode)?;

        let states_before = states_to_array(episode.states_before());
        let states_after = states_to_array(episode.states_after());
        let rewards = Array1::from(episode.discounted_rewards().to_vec());
        let weights = LossWeights {
            value: self.config.value_loss_weight,
            entropy: self.config.entropy_loss_weight,
        };

        let (targets, loss, grads) = {
            let network = self.read_network()?;
            let next_values = terminal_bootstrap(network.forward(&states_after).value);
            let targets = bootstrap_targets(&rewards, &next_values);
            let (loss, grads) =
                network.loss_and_gradients(&states_before, episode.actions(), &targets, weights);
            (targets, loss, grads)
        };

        {
            let mut optimizer = self.lock_optimizer()?;
            let mut network = self.write_network()?;
            optimizer.step(&mut network, &grads);
        }
        let train_steps = self.train_steps.fetch_add(1, Ordering::SeqCst) + 1;

        let summary = TrainingSummary {
            episode_len: episode.len(),
            episode_reward: episode.reward_sum(),
            bootstrapped_reward: targets.sum(),
            loss: loss.total,
            train_steps,
        };
        info!(
            "Training episode complete: step={} len={} reward={:.3} bootstrapped_reward={:.3} loss={:.5}",
            summary.train_steps,
            summary.episode_len,
            summary.episode_reward,
            summary.bootstrapped_reward,
            summary.loss
        );
        debug!(
            "Loss terms: policy={:.5} value={:.5} entropy={:.5}",
            loss.policy, loss.value, loss.entropy
        );

        self.save_network()?;
        Ok(Some(summary))
    }

    /// Write the current parameters and optimizer state to the checkpoint
    pub fn save_network(&self) -> Result<PathBuf> {
        let checkpoint = {
            let optimizer = self.lock_optimizer()?;
            let network = self.read_network()?;
            Checkpoint::new(
                network.clone(),
                optimizer.mean_square().clone(),
                self.train_steps(),
            )
        };
        self.checkpoints.save(&checkpoint)
    }

    /// Restore the latest checkpoint.
    ///
    /// Returns whether parameters were restored. A missing, unreadable or
    /// mismatched checkpoint leaves the current parameters in place.
    pub fn load_network(&self) -> bool {
        match self.try_load_network() {
            Ok(restored) => restored,
            Err(e) => {
                warn!(
                    "Ignoring checkpoint in {}: {}",
                    self.checkpoints.dir().display(),
                    e
                );
                false
            }
        }
    }

    fn try_load_network(&self) -> Result<bool> {
        let Some(checkpoint) = self.checkpoints.load_latest()? else {
            debug!("No checkpoint in {}", self.checkpoints.dir().display());
            return Ok(false);
        };

        let action_count = self.config.action_count;
        if !checkpoint.parameters.has_shape(action_count)
            || !checkpoint.optimizer_state.has_shape(action_count)
        {
            return Err(A3cError::Checkpoint(format!(
                "checkpoint has {} actions, agent has {}",
                checkpoint.action_count, action_count
            )));
        }

        {
            let mut optimizer = self.lock_optimizer()?;
            let mut network = self.write_network()?;
            *network = checkpoint.parameters;
            optimizer.restore(checkpoint.optimizer_state);
        }
        self.train_steps.store(checkpoint.train_steps, Ordering::SeqCst);

        info!(
            "Restored checkpoint from {} ({} training steps, saved {})",
            self.checkpoints.dir().display(),
            checkpoint.train_steps,
            checkpoint.saved_at
        );
        Ok(true)
    }
}
