//! Checkpoint persistence for network parameters

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use a3c_core::{A3cError, Result};

use crate::network::Parameters;

/// Current on-disk format version
pub const CHECKPOINT_VERSION: u32 = 1;

const CHECKPOINT_EXTENSION: &str = "json";

/// Snapshot of everything needed to resume training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub action_count: usize,
    pub train_steps: u64,
    pub saved_at: DateTime<Utc>,
    pub parameters: Parameters,
    /// RMSProp squared-gradient averages
    pub optimizer_state: Parameters,
}

impl Checkpoint {
    pub fn new(parameters: Parameters, optimizer_state: Parameters, train_steps: u64) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            action_count: parameters.action_count(),
            train_steps,
            saved_at: Utc::now(),
            parameters,
            optimizer_state,
        }
    }
}

/// Directory of JSON checkpoints.
///
/// Saving always writes `<name>.json`; loading picks the most recently
/// modified `*.json` file in the directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
    name: String,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path written by [`CheckpointStore::save`]
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, CHECKPOINT_EXTENSION))
    }

    /// Most recently modified checkpoint file, if any
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_checkpoint =
                path.extension().and_then(|ext| ext.to_str()) == Some(CHECKPOINT_EXTENSION);
            let metadata = entry.metadata()?;
            if !is_checkpoint || !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified()?;
            if latest.as_ref().map_or(true, |(newest, _)| modified >= *newest) {
                latest = Some((modified, path));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }

    /// Read the latest checkpoint. `Ok(None)` when the directory holds none.
    pub fn load_latest(&self) -> Result<Option<Checkpoint>> {
        let Some(path) = self.latest()? else {
            return Ok(None);
        };

        let content = fs::read_to_string(&path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(A3cError::Checkpoint(format!(
                "{} has format version {}, expected {}",
                path.display(),
                checkpoint.version,
                CHECKPOINT_VERSION
            )));
        }

        debug!("Read checkpoint {}", path.display());
        Ok(Some(checkpoint))
    }

    /// Write the checkpoint, replacing the previous one atomically
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path();
        let tmp = self.dir.join(format!(".{}.tmp", self.name));
        let content = serde_json::to_string_pretty(checkpoint)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;

        debug!("Wrote checkpoint {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkpoint() -> Checkpoint {
        let mut parameters = Parameters::zeros(2);
        parameters.w1[[1, 3]] = 0.5;
        Checkpoint::new(parameters, Parameters::filled(2, 1.0), 7)
    }

    #[test]
    fn test_missing_dir_has_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("absent"), "cartpole");

        assert!(store.latest().unwrap().is_none());
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("saved-networks"), "cartpole");

        let path = store.save(&sample_checkpoint()).unwrap();
        assert_eq!(path, store.path());
        assert!(path.ends_with("cartpole.json"));

        let loaded = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded.version, CHECKPOINT_VERSION);
        assert_eq!(loaded.action_count, 2);
        assert_eq!(loaded.train_steps, 7);
        assert_eq!(loaded.parameters.w1[[1, 3]], 0.5);
        assert_eq!(loaded.optimizer_state, Parameters::filled(2, 1.0));
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "cartpole");

        store.save(&sample_checkpoint()).unwrap();
        let mut second = sample_checkpoint();
        second.train_steps = 8;
        store.save(&second).unwrap();

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.load_latest().unwrap().unwrap().train_steps, 8);
    }

    #[test]
    fn test_corrupt_checkpoint_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cartpole.json"), "{ not json").unwrap();
        let store = CheckpointStore::new(dir.path(), "cartpole");

        assert!(store.load_latest().is_err());
    }

    #[test]
    fn test_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let store = CheckpointStore::new(dir.path(), "cartpole");

        assert!(store.latest().unwrap().is_none());
    }
}
