//! CLI command modules

pub mod config;
pub mod evaluate;
pub mod train;
