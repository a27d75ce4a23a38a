//! Key-value snapshots owned by the surrounding application: the last
//! playback rate and the last position per score.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{timeline::Tick, Result};

pub const RATE_KEY: &str = "playbackRate";

pub fn position_key(score_id: &str) -> String {
    format!("position:{score_id}")
}

pub trait SnapshotStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<()>;

    fn playback_rate(&self) -> Option<f64> {
        self.get(RATE_KEY)?.parse().ok().filter(|rate: &f64| rate.is_finite())
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.set(RATE_KEY, rate.to_string())
    }

    fn position(&self, score_id: &str) -> Option<Tick> {
        self.get(&position_key(score_id))?.parse().ok()
    }

    fn set_position(&mut self, score_id: &str, tick: Tick) -> Result<()> {
        self.set(&position_key(score_id), tick.to_string())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// A flat JSON object on disk, rewritten on every `set`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(path = %path.display(), entries = values.len(), "snapshot store opened");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
