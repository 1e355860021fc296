//! Cart-pole environment
//!
//! Classic-control cart-pole dynamics with Euler integration. The agent only
//! sees it through the [`Environment`] trait.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use a3c_core::Observation;

const GRAVITY: f64 = 9.8;
const CART_MASS: f64 = 1.0;
const POLE_MASS: f64 = 0.1;
const TOTAL_MASS: f64 = CART_MASS + POLE_MASS;
/// Half the pole length
const POLE_LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = POLE_MASS * POLE_LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;

const X_THRESHOLD: f64 = 2.4;
const THETA_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;

/// Result of one environment step
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub state: Observation,
    pub reward: f64,
    /// The episode is over, for any reason
    pub done: bool,
    /// The episode hit the step limit rather than failing
    pub truncated: bool,
}

/// An episodic environment with a discrete action space
pub trait Environment: Send {
    /// Number of discrete actions
    fn action_count(&self) -> usize;

    /// Start a new episode and return its first state
    fn reset(&mut self) -> Observation;

    /// Apply an action
    fn step(&mut self, action: usize) -> Result<Step>;
}

/// Pole balanced on a cart; action 0 pushes left, 1 pushes right
#[derive(Debug, Clone)]
pub struct CartPole {
    state: Observation,
    steps: usize,
    max_steps: usize,
    rng: StdRng,
}

impl CartPole {
    pub const ACTIONS: usize = 2;

    pub fn new(max_steps: usize) -> Self {
        Self::from_rng(max_steps, StdRng::from_entropy())
    }

    pub fn with_seed(max_steps: usize, seed: u64) -> Self {
        Self::from_rng(max_steps, StdRng::seed_from_u64(seed))
    }

    fn from_rng(max_steps: usize, rng: StdRng) -> Self {
        Self {
            state: [0.0; 4],
            steps: 0,
            max_steps,
            rng,
        }
    }

    /// Start an episode from a given state
    pub fn reset_to(&mut self, state: Observation) {
        self.state = state;
        self.steps = 0;
    }

    fn failed(&self) -> bool {
        let [x, _, theta, _] = self.state;
        !(-X_THRESHOLD..=X_THRESHOLD).contains(&x)
            || !(-THETA_THRESHOLD..=THETA_THRESHOLD).contains(&theta)
    }
}

impl Environment for CartPole {
    fn action_count(&self) -> usize {
        Self::ACTIONS
    }

    fn reset(&mut self) -> Observation {
        let state = [
            self.rng.gen_range(-0.05..0.05),
            self.rng.gen_range(-0.05..0.05),
            self.rng.gen_range(-0.05..0.05),
            self.rng.gen_range(-0.05..0.05),
        ];
        self.reset_to(state);
        state
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        let force = match action {
            0 => -FORCE_MAG,
            1 => FORCE_MAG,
            _ => bail!("invalid cart-pole action {action}"),
        };

        let [x, x_dot, theta, theta_dot] = self.state;
        let (sin_theta, cos_theta) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sin_theta) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (POLE_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
        self.steps += 1;

        let failed = self.failed();
        let truncated = !failed && self.steps >= self.max_steps;

        Ok(Step {
            state: self.state,
            reward: 1.0,
            done: failed || truncated,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_near_upright() {
        let mut env = CartPole::with_seed(500, 3);
        for _ in 0..20 {
            let state = env.reset();
            assert!(state.iter().all(|v| v.abs() <= 0.05));
        }
    }

    #[test]
    fn test_single_step_dynamics() {
        let mut env = CartPole::with_seed(500, 0);
        env.reset_to([0.0; 4]);

        let step = env.step(1).unwrap();
        let [x, x_dot, theta, theta_dot] = step.state;

        assert_eq!(x, 0.0);
        assert_eq!(theta, 0.0);
        assert!((x_dot - 0.195_122).abs() < 1e-5);
        assert!((theta_dot + 0.292_683).abs() < 1e-5);
        assert_eq!(step.reward, 1.0);
        assert!(!step.done);
    }

    #[test]
    fn test_constant_push_fails() {
        let mut env = CartPole::with_seed(500, 1);
        env.reset();

        let mut steps = 0;
        loop {
            let step = env.step(1).unwrap();
            steps += 1;
            if step.done {
                assert!(!step.truncated);
                break;
            }
        }
        assert!(steps < 100);
    }

    #[test]
    fn test_step_limit_truncates() {
        let mut env = CartPole::with_seed(3, 2);
        env.reset_to([0.0; 4]);

        assert!(!env.step(0).unwrap().done);
        assert!(!env.step(1).unwrap().done);
        let last = env.step(0).unwrap();
        assert!(last.done);
        assert!(last.truncated);
    }

    #[test]
    fn test_invalid_action() {
        let mut env = CartPole::with_seed(500, 4);
        env.reset();
        assert!(env.step(2).is_err());
    }
}
