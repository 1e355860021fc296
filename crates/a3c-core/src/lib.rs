//! A3C Core - shared types for the cart-pole actor-critic agent
//!
//! This crate provides the episode representation exchanged between the
//! producer workers and the background trainer, plus the common error type.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod episode;
pub mod error;

pub use episode::{discount_rewards, Episode, EpisodeBuilder, Observation, STATE_DIM};
pub use error::{A3cError, Result};
