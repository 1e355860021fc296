//! RMSProp optimizer

use ndarray::Zip;
use serde::{Deserialize, Serialize};

use crate::network::Parameters;

/// RMSProp without momentum.
///
/// The squared-gradient average starts at one for every parameter, so the
/// first steps are close to plain gradient descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmsProp {
    learning_rate: f64,
    decay: f64,
    epsilon: f64,
    mean_square: Parameters,
}

impl RmsProp {
    pub fn new(action_count: usize, learning_rate: f64, decay: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            decay,
            epsilon,
            mean_square: Parameters::filled(action_count, 1.0),
        }
    }

    /// Accumulated squared-gradient averages
    pub fn mean_square(&self) -> &Parameters {
        &self.mean_square
    }

    /// Replace the accumulators, e.g. from a checkpoint
    pub fn restore(&mut self, mean_square: Parameters) {
        self.mean_square = mean_square;
    }

    /// Apply one update: `ms = decay * ms + (1 - decay) * g^2`,
    /// `p -= lr * g / sqrt(ms + eps)`
    pub fn step(&mut self, params: &mut Parameters, grads: &Parameters) {
        let (lr, decay, eps) = (self.learning_rate, self.decay, self.epsilon);

        for ((param, grad), ms) in params
            .tensors_mut()
            .into_iter()
            .zip(grads.tensors())
            .zip(self.mean_square.tensors_mut())
        {
            Zip::from(param).and(&grad).and(ms).for_each(|p, &g, m| {
                *m = decay * *m + (1.0 - decay) * g * g;
                *p -= lr * g / (*m + eps).sqrt();
            });
        }
    }
}
