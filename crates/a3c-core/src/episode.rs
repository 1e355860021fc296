//! Episode representation shared by producers and the trainer

use serde::{Deserialize, Serialize};

use crate::error::{A3cError, Result};

/// Number of features in a cart-pole observation
pub const STATE_DIM: usize = 4;

/// Cart position, cart velocity, pole angle, pole angular velocity
pub type Observation = [f64; STATE_DIM];

/// A completed episode labelled with discounted rewards.
///
/// All four sequences are aligned by step index and have the same,
/// non-zero length. An episode is produced once and consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    states_before: Vec<Observation>,
    actions: Vec<usize>,
    states_after: Vec<Observation>,
    discounted_rewards: Vec<f64>,
}

impl Episode {
    /// Create an episode, checking that the sequences line up
    pub fn new(
        states_before: Vec<Observation>,
        actions: Vec<usize>,
        states_after: Vec<Observation>,
        discounted_rewards: Vec<f64>,
    ) -> Result<Self> {
        let len = states_before.len();
        if len == 0 {
            return Err(A3cError::InvalidEpisode("episode has no steps".to_string()));
        }
        if actions.len() != len || states_after.len() != len || discounted_rewards.len() != len {
            return Err(A3cError::InvalidEpisode(format!(
                "misaligned episode: {} states, {} actions, {} next states, {} rewards",
                len,
                actions.len(),
                states_after.len(),
                discounted_rewards.len()
            )));
        }

        Ok(Self {
            states_before,
            actions,
            states_after,
            discounted_rewards,
        })
    }

    /// Number of steps in the episode
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always false for a constructed episode
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn states_before(&self) -> &[Observation] {
        &self.states_before
    }

    pub fn actions(&self) -> &[usize] {
        &self.actions
    }

    pub fn states_after(&self) -> &[Observation] {
        &self.states_after
    }

    pub fn discounted_rewards(&self) -> &[f64] {
        &self.discounted_rewards
    }

    /// Sum of the reward labels as stored
    pub fn reward_sum(&self) -> f64 {
        self.discounted_rewards.iter().sum()
    }

    /// Largest action index used in the episode
    pub fn max_action(&self) -> usize {
        self.actions.iter().copied().max().unwrap_or(0)
    }
}

/// Accumulates transitions while an episode is being played
#[derive(Debug, Default)]
pub struct EpisodeBuilder {
    states_before: Vec<Observation>,
    actions: Vec<usize>,
    states_after: Vec<Observation>,
    rewards: Vec<f64>,
}

impl EpisodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `(s, a, r, s')` transition
    pub fn record(&mut self, state: Observation, action: usize, reward: f64, next_state: Observation) {
        self.states_before.push(state);
        self.actions.push(action);
        self.rewards.push(reward);
        self.states_after.push(next_state);
    }

    /// Steps recorded so far
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Undiscounted reward collected so far
    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    /// Close the episode, replacing raw rewards with discounted returns
    pub fn finish(self, gamma: f64) -> Result<Episode> {
        let discounted = discount_rewards(&self.rewards, gamma);
        Episode::new(self.states_before, self.actions, self.states_after, discounted)
    }
}

/// Discounted returns: `G_t = r_t + gamma * G_{t+1}`, with `G` after the
/// last step taken as zero.
pub fn discount_rewards(rewards: &[f64], gamma: f64) -> Vec<f64> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running = 0.0;
    for (i, reward) in rewards.iter().enumerate().rev() {
        running = reward + gamma * running;
        returns[i] = running;
    }
    returns
}
