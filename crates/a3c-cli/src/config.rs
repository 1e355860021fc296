//! Configuration loading for the a3c binary

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use a3c_rl::AgentConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub run: RunConfig,
}

/// How episodes are produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub workers: usize,
    pub episodes_per_worker: usize,
    pub gamma: f64,
    pub max_episode_steps: usize,
    pub log_level: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            episodes_per_worker: 250,
            gamma: 0.99,
            max_episode_steps: 500,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// An explicit path must exist; otherwise `./a3c.toml` and
    /// `~/.config/a3c/a3c.toml` are tried. `A3C__SECTION__KEY` environment
    /// variables override file values.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        } else if let Some(path) = Self::find_config_file() {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("A3C")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from("a3c.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("a3c").join("a3c.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;

        if self.run.workers == 0 {
            bail!("run.workers must be at least 1");
        }
        if !(self.run.gamma > 0.0 && self.run.gamma <= 1.0) {
            bail!("run.gamma must be in (0, 1], got {}", self.run.gamma);
        }
        if self.run.max_episode_steps == 0 {
            bail!("run.max_episode_steps must be at least 1");
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
