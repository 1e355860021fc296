//! Agent configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use a3c_core::{A3cError, Result};

/// Hyperparameters and checkpoint location for an [`crate::Agent`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Size of the discrete action space
    #[serde(default = "default_action_count")]
    pub action_count: usize,

    /// RMSProp learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// RMSProp decay of the squared-gradient average
    #[serde(default = "default_rms_decay")]
    pub rms_decay: f64,

    /// RMSProp denominator epsilon
    #[serde(default = "default_rms_epsilon")]
    pub rms_epsilon: f64,

    /// Weight of the squared-advantage value loss
    #[serde(default = "default_value_loss_weight")]
    pub value_loss_weight: f64,

    /// Weight of the entropy term (added to the loss)
    #[serde(default = "default_entropy_loss_weight")]
    pub entropy_loss_weight: f64,

    /// Directory holding checkpoints
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Base file name of the checkpoint written after each training step
    #[serde(default = "default_checkpoint_name")]
    pub checkpoint_name: String,

    /// Bound on queued episodes; the oldest are dropped when full
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,

    /// Seed for parameter initialisation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_action_count() -> usize {
    2
}
fn default_learning_rate() -> f64 {
    0.005
}
fn default_rms_decay() -> f64 {
    0.99
}
fn default_rms_epsilon() -> f64 {
    1e-10
}
fn default_value_loss_weight() -> f64 {
    0.5
}
fn default_entropy_loss_weight() -> f64 {
    0.01
}
fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("saved-networks")
}
fn default_checkpoint_name() -> String {
    "cartpole".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            action_count: default_action_count(),
            learning_rate: default_learning_rate(),
            rms_decay: default_rms_decay(),
            rms_epsilon: default_rms_epsilon(),
            value_loss_weight: default_value_loss_weight(),
            entropy_loss_weight: default_entropy_loss_weight(),
            checkpoint_dir: default_checkpoint_dir(),
            checkpoint_name: default_checkpoint_name(),
            queue_capacity: None,
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Default configuration for the given action count
    pub fn new(action_count: usize) -> Self {
        Self {
            action_count,
            ..Self::default()
        }
    }

    /// Set the checkpoint directory
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Bound the episode queue
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Make parameter initialisation deterministic
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the configuration for values the agent cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.action_count == 0 {
            return Err(A3cError::Config("action_count must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(A3cError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.rms_decay) {
            return Err(A3cError::Config(format!(
                "rms_decay must be in [0, 1), got {}",
                self.rms_decay
            )));
        }
        if self.rms_epsilon < 0.0 {
            return Err(A3cError::Config("rms_epsilon must not be negative".to_string()));
        }
        if self.checkpoint_name.is_empty() {
            return Err(A3cError::Config("checkpoint_name must not be empty".to_string()));
        }
        if self.queue_capacity == Some(0) {
            return Err(A3cError::Config("queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}
