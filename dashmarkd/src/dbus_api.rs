use std::sync::Arc;

use tokio::sync::RwLock;
use zbus::{interface, object_server::SignalEmitter};

use crate::config::{DEFAULT_SYNC_INTERVAL_MIN, SyncConfig};
use crate::sync::engine::SyncEngine;
use crate::sync::tree::{MemoryTree, TreeSource};

/// D-Bus control surface for the synchronizer. Without an engine attached
/// the service answers from an in-memory configuration, which keeps it
/// testable outside a running daemon.
#[derive(Default)]
pub struct SyncControlService {
    backend: Option<Arc<SyncEngine<MemoryTree>>>,
    fallback: RwLock<SyncConfig>,
}

impl SyncControlService {
    pub fn with_engine(engine: Arc<SyncEngine<MemoryTree>>) -> Self {
        Self {
            backend: Some(engine),
            fallback: RwLock::new(SyncConfig::default()),
        }
    }

    async fn apply_config(
        &self,
        apply: impl FnOnce(&mut SyncConfig),
    ) -> zbus::fdo::Result<SyncConfig> {
        if let Some(engine) = &self.backend {
            return engine
                .config_store()
                .update(apply)
                .map_err(|err| zbus::fdo::Error::Failed(format!("config update failed: {err}")));
        }
        let mut fallback = self.fallback.write().await;
        apply(&mut fallback);
        Ok(fallback.clone())
    }

    async fn current_config(&self) -> zbus::fdo::Result<SyncConfig> {
        if let Some(engine) = &self.backend {
            return engine
                .config_store()
                .load()
                .map_err(|err| zbus::fdo::Error::Failed(format!("config load failed: {err}")));
        }
        Ok(self.fallback.read().await.clone())
    }
}

#[interface(name = "dev.dashmark.Sync1")]
impl SyncControlService {
    /// Run one reconciliation pass on demand and report its outcome.
    async fn full_sync(&self) -> zbus::fdo::Result<String> {
        eprintln!("[dashmarkd] dbus FullSync");
        let Some(engine) = &self.backend else {
            return Ok("sync skipped: no engine attached".to_string());
        };
        match engine.full_sync().await {
            Ok(Some(delta)) => Ok(delta.summary()),
            Ok(None) => Ok("sync disabled or no folders watched".to_string()),
            Err(err) => Err(zbus::fdo::Error::Failed(format!("sync failed: {err}"))),
        }
    }

    async fn set_enabled(&self, enabled: bool) -> zbus::fdo::Result<()> {
        eprintln!("[dashmarkd] dbus SetEnabled enabled={enabled}");
        self.apply_config(|config| config.enabled = enabled).await?;
        Ok(())
    }

    async fn set_watched_folders(&self, folders: Vec<String>) -> zbus::fdo::Result<()> {
        eprintln!("[dashmarkd] dbus SetWatchedFolders count={}", folders.len());
        self.apply_config(|config| config.watched_folders = folders)
            .await?;
        Ok(())
    }

    async fn set_category_prefix(&self, prefix: String) -> zbus::fdo::Result<()> {
        eprintln!("[dashmarkd] dbus SetCategoryPrefix prefix={prefix}");
        self.apply_config(|config| config.category_prefix = prefix)
            .await?;
        Ok(())
    }

    /// Zero falls back to the default interval. The periodic loop re-reads
    /// the interval after every pass, so no restart is needed.
    async fn set_sync_interval(&self, minutes: u64) -> zbus::fdo::Result<()> {
        eprintln!("[dashmarkd] dbus SetSyncInterval minutes={minutes}");
        let minutes = if minutes == 0 {
            DEFAULT_SYNC_INTERVAL_MIN
        } else {
            minutes
        };
        self.apply_config(|config| config.sync_interval_min = minutes)
            .await?;
        Ok(())
    }

    async fn get_status(&self) -> zbus::fdo::Result<(bool, String)> {
        let config = self.current_config().await?;
        Ok((
            config.enabled,
            config.last_sync.unwrap_or_else(|| "never".to_string()),
        ))
    }

    /// JSON rendering of the live browser tree for a folder-selection UI.
    async fn get_tree(&self) -> zbus::fdo::Result<String> {
        let Some(engine) = &self.backend else {
            return Ok("[]".to_string());
        };
        let roots = engine.tree().roots().await;
        serde_json::to_string(&roots)
            .map_err(|err| zbus::fdo::Error::Failed(format!("tree serialization failed: {err}")))
    }

    #[zbus(signal)]
    pub async fn sync_complete(
        ctxt: &SignalEmitter<'_>,
        success: bool,
        message: &str,
    ) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_service_round_trips_configuration() {
        let service = SyncControlService::default();
        service.set_enabled(true).await.unwrap();
        service.set_sync_interval(30).await.unwrap();
        service
            .set_watched_folders(vec!["10".to_string()])
            .await
            .unwrap();

        let (enabled, last_sync) = service.get_status().await.unwrap();
        assert!(enabled);
        assert_eq!(last_sync, "never");

        let fallback = service.fallback.read().await;
        assert_eq!(fallback.sync_interval_min, 30);
        assert_eq!(fallback.watched_folders, vec!["10".to_string()]);
    }

    #[tokio::test]
    async fn zero_interval_falls_back_to_default() {
        let service = SyncControlService::default();
        service.set_sync_interval(0).await.unwrap();
        assert_eq!(
            service.fallback.read().await.sync_interval_min,
            DEFAULT_SYNC_INTERVAL_MIN
        );
    }

    #[tokio::test]
    async fn full_sync_without_engine_reports_skip() {
        let service = SyncControlService::default();
        let message = service.full_sync().await.unwrap();
        assert!(message.contains("no engine"));
    }

    #[tokio::test]
    async fn get_tree_without_engine_is_empty() {
        let service = SyncControlService::default();
        assert_eq!(service.get_tree().await.unwrap(), "[]");
    }
}
