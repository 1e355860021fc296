//! Actor-critic network: shared ReLU hidden layer, softmax policy head and
//! scalar value head, with hand-written backpropagation.

use ndarray::{Array1, Array2, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use a3c_core::{Observation, STATE_DIM};

/// Width of the shared hidden layer
pub const HIDDEN_UNITS: usize = 16;

/// Added inside every logarithm so a zero probability stays finite
pub const LOG_EPSILON: f64 = 1e-10;

/// Weights and biases of the network.
///
/// The same shape is reused for gradients and optimizer accumulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub w1: Array2<f64>,
    pub b1: Array1<f64>,
    pub wp: Array2<f64>,
    pub bp: Array1<f64>,
    pub wv: Array2<f64>,
    pub bv: Array1<f64>,
}

/// Activations of one forward pass over a batch of states
#[derive(Debug, Clone)]
pub struct Forward {
    pub hidden_pre: Array2<f64>,
    pub hidden: Array2<f64>,
    pub policy: Array2<f64>,
    pub value: Array1<f64>,
}

/// Loss coefficients
#[derive(Debug, Clone, Copy)]
pub struct LossWeights {
    pub value: f64,
    pub entropy: f64,
}

/// Batch-averaged loss terms
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LossBreakdown {
    pub total: f64,
    pub policy: f64,
    pub value: f64,
    pub entropy: f64,
}

impl Parameters {
    /// Glorot-uniform weights, zero biases
    pub fn glorot<R: Rng + ?Sized>(action_count: usize, rng: &mut R) -> Self {
        Self {
            w1: glorot_uniform(STATE_DIM, HIDDEN_UNITS, rng),
            b1: Array1::zeros(HIDDEN_UNITS),
            wp: glorot_uniform(HIDDEN_UNITS, action_count, rng),
            bp: Array1::zeros(action_count),
            wv: glorot_uniform(HIDDEN_UNITS, 1, rng),
            bv: Array1::zeros(1),
        }
    }

    /// Every entry set to `value`
    pub fn filled(action_count: usize, value: f64) -> Self {
        Self {
            w1: Array2::from_elem((STATE_DIM, HIDDEN_UNITS), value),
            b1: Array1::from_elem(HIDDEN_UNITS, value),
            wp: Array2::from_elem((HIDDEN_UNITS, action_count), value),
            bp: Array1::from_elem(action_count, value),
            wv: Array2::from_elem((HIDDEN_UNITS, 1), value),
            bv: Array1::from_elem(1, value),
        }
    }

    pub fn zeros(action_count: usize) -> Self {
        Self::filled(action_count, 0.0)
    }

    pub fn action_count(&self) -> usize {
        self.bp.len()
    }

    /// True when every tensor has the layout of a network with `action_count` outputs
    pub fn has_shape(&self, action_count: usize) -> bool {
        self.w1.dim() == (STATE_DIM, HIDDEN_UNITS)
            && self.b1.len() == HIDDEN_UNITS
            && self.wp.dim() == (HIDDEN_UNITS, action_count)
            && self.bp.len() == action_count
            && self.wv.dim() == (HIDDEN_UNITS, 1)
            && self.bv.len() == 1
    }

    pub fn is_finite(&self) -> bool {
        self.tensors()
            .iter()
            .all(|tensor| tensor.iter().all(|x| x.is_finite()))
    }

    /// All tensors, in a fixed order
    pub fn tensors(&self) -> [ArrayViewD<'_, f64>; 6] {
        [
            self.w1.view().into_dyn(),
            self.b1.view().into_dyn(),
            self.wp.view().into_dyn(),
            self.bp.view().into_dyn(),
            self.wv.view().into_dyn(),
            self.bv.view().into_dyn(),
        ]
    }

    /// All tensors mutably, in the same order as [`Parameters::tensors`]
    pub fn tensors_mut(&mut self) -> [ArrayViewMutD<'_, f64>; 6] {
        [
            self.w1.view_mut().into_dyn(),
            self.b1.view_mut().into_dyn(),
            self.wp.view_mut().into_dyn(),
            self.bp.view_mut().into_dyn(),
            self.wv.view_mut().into_dyn(),
            self.bv.view_mut().into_dyn(),
        ]
    }

    /// Run the network on a `[batch, STATE_DIM]` matrix
    pub fn forward(&self, states: &Array2<f64>) -> Forward {
        let hidden_pre = states.dot(&self.w1) + &self.b1;
        let hidden = hidden_pre.mapv(|x| x.max(0.0));
        let logits = hidden.dot(&self.wp) + &self.bp;
        let policy = softmax_rows(&logits);
        let value = (hidden.dot(&self.wv) + &self.bv).column(0).to_owned();

        Forward {
            hidden_pre,
            hidden,
            policy,
            value,
        }
    }

    /// Action distribution for a single state
    pub fn policy(&self, state: &Observation) -> Array1<f64> {
        self.forward(&states_to_array(std::slice::from_ref(state)))
            .policy
            .row(0)
            .to_owned()
    }

    /// Value estimate for a single state
    pub fn value(&self, state: &Observation) -> f64 {
        self.forward(&states_to_array(std::slice::from_ref(state))).value[0]
    }

    /// Combined actor-critic loss and its gradient.
    ///
    /// Per step `t`, with `adv_t = targets_t - V(s_t)`:
    /// - policy: `-ln(p(a_t) + eps) * adv_t`, `adv_t` held constant
    /// - value: `value_weight * adv_t^2`
    /// - entropy: `entropy_weight * sum_j p_j ln(p_j + eps)`, added
    ///
    /// Terms are averaged over the batch.
    pub fn loss_and_gradients(
        &self,
        states: &Array2<f64>,
        actions: &[usize],
        targets: &Array1<f64>,
        weights: LossWeights,
    ) -> (LossBreakdown, Parameters) {
        let n = states.nrows();
        let action_count = self.action_count();
        let scale = 1.0 / n as f64;
        let fwd = self.forward(states);

        let mut d_logits = Array2::<f64>::zeros((n, action_count));
        let mut d_value = Array1::<f64>::zeros(n);
        let mut loss = LossBreakdown::default();

        for (i, &action) in actions.iter().enumerate() {
            let probs = fwd.policy.row(i);
            let advantage = targets[i] - fwd.value[i];
            let p_action = probs[action];

            loss.policy -= (p_action + LOG_EPSILON).ln() * advantage;
            loss.value += weights.value * advantage * advantage;
            loss.entropy += weights.entropy
                * probs
                    .iter()
                    .map(|&p| p * (p + LOG_EPSILON).ln())
                    .sum::<f64>();

            // dL/dp for the policy and entropy terms
            let mut d_probs =
                probs.mapv(|p| weights.entropy * ((p + LOG_EPSILON).ln() + p / (p + LOG_EPSILON)));
            d_probs[action] -= advantage / (p_action + LOG_EPSILON);

            // softmax backward
            let weighted: f64 = probs.iter().zip(d_probs.iter()).map(|(p, d)| p * d).sum();
            for k in 0..action_count {
                d_logits[[i, k]] = scale * probs[k] * (d_probs[k] - weighted);
            }

            d_value[i] = -2.0 * scale * weights.value * advantage;
        }

        loss.policy *= scale;
        loss.value *= scale;
        loss.entropy *= scale;
        loss.total = loss.policy + loss.value + loss.entropy;

        let d_value = d_value.insert_axis(Axis(1));
        let mut d_hidden = d_logits.dot(&self.wp.t()) + d_value.dot(&self.wv.t());
        d_hidden.zip_mut_with(&fwd.hidden_pre, |d, &pre| {
            if pre <= 0.0 {
                *d = 0.0;
            }
        });

        let grads = Parameters {
            w1: states.t().dot(&d_hidden),
            b1: d_hidden.sum_axis(Axis(0)),
            wp: fwd.hidden.t().dot(&d_logits),
            bp: d_logits.sum_axis(Axis(0)),
            wv: fwd.hidden.t().dot(&d_value),
            bv: d_value.sum_axis(Axis(0)),
        };

        (loss, grads)
    }
}

/// Stack observations into a `[batch, STATE_DIM]` matrix
pub fn states_to_array(states: &[Observation]) -> Array2<f64> {
    Array2::from_shape_fn((states.len(), STATE_DIM), |(i, j)| states[i][j])
}

fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
    let mut out = logits.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    out
}

fn glorot_uniform<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const WEIGHTS: LossWeights = LossWeights {
        value: 0.5,
        entropy: 0.01,
    };

    fn sample_states() -> Array2<f64> {
        states_to_array(&[
            [0.03, -0.2, 0.04, 0.3],
            [0.01, 0.15, -0.02, -0.25],
            [-0.04, 0.4, 0.06, 0.1],
        ])
    }

    /// Loss with the policy-term advantages frozen, matching the stop-gradient
    fn surrogate_loss(
        params: &Parameters,
        states: &Array2<f64>,
        actions: &[usize],
        targets: &Array1<f64>,
        frozen: &Array1<f64>,
    ) -> f64 {
        let fwd = params.forward(states);
        let n = states.nrows() as f64;
        let mut total = 0.0;
        for (i, &a) in actions.iter().enumerate() {
            let probs = fwd.policy.row(i);
            let advantage = targets[i] - fwd.value[i];
            total -= (probs[a] + LOG_EPSILON).ln() * frozen[i];
            total += WEIGHTS.value * advantage * advantage;
            total += WEIGHTS.entropy
                * probs
                    .iter()
                    .map(|&p| p * (p + LOG_EPSILON).ln())
                    .sum::<f64>();
        }
        total / n
    }

    #[test]
    fn test_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = Parameters::glorot(3, &mut rng);

        assert!(params.has_shape(3));
        assert!(!params.has_shape(2));
        assert_eq!(params.action_count(), 3);
        assert!(params.is_finite());

        let fwd = params.forward(&sample_states());
        assert_eq!(fwd.policy.dim(), (3, 3));
        assert_eq!(fwd.value.len(), 3);
        assert_eq!(fwd.hidden.dim(), (3, HIDDEN_UNITS));
    }

    #[test]
    fn test_policy_rows_are_distributions() {
        let mut rng = StdRng::seed_from_u64(11);
        let params = Parameters::glorot(4, &mut rng);
        let fwd = params.forward(&sample_states());

        for row in fwd.policy.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
            assert!(row.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn test_zero_policy_head_is_uniform() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut params = Parameters::glorot(4, &mut rng);
        params.wp.fill(0.0);
        params.bp.fill(0.0);

        let probs = params.policy(&[0.1, 0.2, 0.3, 0.4]);
        for &p in &probs {
            assert!((p - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let logits = Array2::from_shape_vec((1, 2), vec![1000.0, 0.0]).unwrap();
        let probs = softmax_rows(&logits);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(42);
        let params = Parameters::glorot(2, &mut rng);
        let states = sample_states();
        let actions = [0, 1, 1];
        let targets = Array1::from(vec![1.5, 0.7, -0.3]);

        let values = params.forward(&states).value;
        let frozen = &targets - &values;

        let (loss, grads) = params.loss_and_gradients(&states, &actions, &targets, WEIGHTS);
        let base = surrogate_loss(&params, &states, &actions, &targets, &frozen);
        assert!((loss.total - base).abs() < 1e-12);

        let h = 1e-6;
        for tensor in 0..6 {
            let count = params.tensors()[tensor].len();
            for idx in 0..count {
                let mut plus = params.clone();
                if let Some(x) = plus.tensors_mut()[tensor].iter_mut().nth(idx) {
                    *x += h;
                }
                let mut minus = params.clone();
                if let Some(x) = minus.tensors_mut()[tensor].iter_mut().nth(idx) {
                    *x -= h;
                }

                let numeric = (surrogate_loss(&plus, &states, &actions, &targets, &frozen)
                    - surrogate_loss(&minus, &states, &actions, &targets, &frozen))
                    / (2.0 * h);
                let analytic = *grads.tensors()[tensor].iter().nth(idx).unwrap();

                assert!(
                    (numeric - analytic).abs() < 1e-5 * (1.0 + numeric.abs()),
                    "tensor {tensor} index {idx}: numeric {numeric} vs analytic {analytic}"
                );
            }
        }
    }

    #[test]
    fn test_entropy_term_is_added() {
        // Uniform policy, zero advantage: only the entropy term remains,
        // and sum p ln p is negative, so the total is negative.
        let mut params = Parameters::zeros(2);
        params.bv.fill(1.0);
        let states = sample_states();
        let targets = Array1::from_elem(3, 1.0);

        let (loss, _) = params.loss_and_gradients(&states, &[0, 1, 0], &targets, WEIGHTS);
        let expected = 0.01 * 2.0 * 0.5 * (0.5f64 + LOG_EPSILON).ln();

        assert!(loss.policy.abs() < 1e-12);
        assert!(loss.value.abs() < 1e-12);
        assert!((loss.entropy - expected).abs() < 1e-12);
        assert!(loss.total < 0.0);
    }
}
