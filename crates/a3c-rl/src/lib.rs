//! A3C RL - asynchronous actor-critic training for cart-pole
//!
//! This crate provides the shared policy/value network, the episode stack
//! fed by producer workers, checkpoint persistence and the background
//! trainer that consumes episodes.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod network;
pub mod optimizer;
pub mod stack;
pub mod trainer;

pub use a3c_core::{A3cError, Episode, Observation, Result};
pub use agent::{Agent, AgentStats, TrainingSummary};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::AgentConfig;
pub use network::Parameters;
pub use optimizer::RmsProp;
pub use stack::EpisodeStack;
pub use trainer::{Trainer, TrainerHandle, TrainerReport};
