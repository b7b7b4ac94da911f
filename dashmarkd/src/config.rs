use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_CATEGORY_PREFIX: &str = "chrome";
pub const DEFAULT_SYNC_INTERVAL_MIN: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid api url: {0}")]
    ApiUrl(#[from] url::ParseError),
    #[error("XDG config directory is unavailable")]
    MissingConfigDir,
}

/// User-editable synchronizer settings. Sync is a no-op while `enabled` is
/// false or `watched_folders` is empty; `last_sync` is informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub watched_folders: Vec<String>,
    #[serde(default = "default_category_prefix")]
    pub category_prefix: String,
    #[serde(default = "default_sync_interval_min")]
    pub sync_interval_min: u64,
    #[serde(default)]
    pub last_sync: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_api_url(),
            watched_folders: Vec::new(),
            category_prefix: default_category_prefix(),
            sync_interval_min: default_sync_interval_min(),
            last_sync: None,
        }
    }
}

impl SyncConfig {
    pub fn validate_api_url(&self) -> Result<url::Url, ConfigError> {
        Ok(url::Url::parse(&self.api_url)?)
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_category_prefix() -> String {
    DEFAULT_CATEGORY_PREFIX.to_string()
}

fn default_sync_interval_min() -> u64 {
    DEFAULT_SYNC_INTERVAL_MIN
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::MissingConfigDir)?;
        path.push("dashmark");
        path.push("config.json");
        Ok(path)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Missing file yields the defaults, matching first-use behavior.
    pub fn load(&self) -> Result<SyncConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(SyncConfig::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, config: &SyncConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Load-modify-save of the whole document.
    pub fn update(&self, apply: impl FnOnce(&mut SyncConfig)) -> Result<SyncConfig, ConfigError> {
        let mut config = self.load()?;
        apply(&mut config);
        self.save(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        (store, dir)
    }

    #[test]
    fn missing_file_loads_defaults() {
        let (store, _dir) = make_store();
        let config = store.load().unwrap();
        assert!(!config.enabled);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.category_prefix, "chrome");
        assert_eq!(config.sync_interval_min, 5);
        assert!(config.watched_folders.is_empty());
        assert!(config.last_sync.is_none());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let (store, _dir) = make_store();
        let config = SyncConfig {
            enabled: true,
            watched_folders: vec!["12".into(), "44".into()],
            last_sync: Some("2024-05-01T12:00:00Z".into()),
            ..SyncConfig::default()
        };
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn update_persists_the_change() {
        let (store, _dir) = make_store();
        let updated = store
            .update(|config| {
                config.enabled = true;
                config.sync_interval_min = 30;
            })
            .unwrap();
        assert!(updated.enabled);
        assert_eq!(store.load().unwrap().sync_interval_min, 30);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let (store, _dir) = make_store();
        std::fs::write(store.path(), r#"{ "enabled": true }"#).unwrap();
        let config = store.load().unwrap();
        assert!(config.enabled);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.sync_interval_min, 5);
    }

    #[test]
    fn validate_api_url_rejects_garbage() {
        let config = SyncConfig {
            api_url: "not a url".into(),
            ..SyncConfig::default()
        };
        assert!(config.validate_api_url().is_err());
        assert!(SyncConfig::default().validate_api_url().is_ok());
    }
}
