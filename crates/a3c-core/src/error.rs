//! Error types for the A3C workspace

use thiserror::Error;

/// Main error type for the agent, trainer and checkpoint store
#[derive(Error, Debug)]
pub enum A3cError {
    #[error("Invalid episode: {0}")]
    InvalidEpisode(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trainer error: {0}")]
    Trainer(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for A3C operations
pub type Result<T> = std::result::Result<T, A3cError>;
