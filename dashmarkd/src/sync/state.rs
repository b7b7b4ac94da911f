use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sync state parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XDG data directory is unavailable")]
    MissingDataDir,
}

/// Persisted two-way ID mapping between browser-tree nodes and store
/// entities. `categories` maps a synced subfolder's node ID to its store
/// category; `bookmarks` maps a bookmark node ID to its store bookmark.
/// Entries are best-effort: a dangling store ID is treated as a cache miss
/// by the engine, never as an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncMap {
    #[serde(default)]
    pub categories: HashMap<String, String>,
    #[serde(default)]
    pub bookmarks: HashMap<String, String>,
}

impl SyncMap {
    /// Deletion-safety check: only store bookmarks we created are ours to
    /// remove.
    pub fn bookmark_is_synced(&self, store_id: &str) -> bool {
        self.bookmarks.values().any(|value| value == store_id)
    }

    pub fn remove_bookmark_by_store_id(&mut self, store_id: &str) {
        let key = self
            .bookmarks
            .iter()
            .find_map(|(node_id, value)| (value == store_id).then(|| node_id.clone()));
        if let Some(key) = key {
            self.bookmarks.remove(&key);
        }
    }
}

/// Whole-file JSON persistence for [`SyncMap`]. Every mutation goes through
/// load-whole / modify / save-whole.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> Result<PathBuf, StateError> {
        let mut path = dirs::data_dir().ok_or(StateError::MissingDataDir)?;
        path.push("dashmark");
        path.push("syncmap.json");
        Ok(path)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn load(&self) -> Result<SyncMap, StateError> {
        if !self.path.exists() {
            return Ok(SyncMap::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, map: &SyncMap) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
