use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dashmark_core::StoreClient;
use zbus::connection::Builder as ConnectionBuilder;
use zbus::object_server::SignalEmitter;

use crate::config::{ConfigError, ConfigStore, DEFAULT_SYNC_INTERVAL_MIN, SyncConfig};
use crate::dbus_api::SyncControlService;
use crate::ids::{DBUS_NAME_SYNC, DBUS_OBJECT_PATH_SYNC};
use crate::sync::chromium;
use crate::sync::engine::SyncEngine;
use crate::sync::events::{diff_tree, watch_bookmarks_file};
use crate::sync::state::StateStore;
use crate::sync::tree::{MemoryTree, TreeSource};

#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub config_file: PathBuf,
    pub state_file: PathBuf,
    pub bookmarks_file: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config_file = match std::env::var_os("DASHMARK_CONFIG_FILE") {
            Some(value) => PathBuf::from(value),
            None => ConfigStore::default_path().context("config directory is unavailable")?,
        };
        let state_file = match std::env::var_os("DASHMARK_STATE_FILE") {
            Some(value) => PathBuf::from(value),
            None => StateStore::default_path().context("data directory is unavailable")?,
        };
        let bookmarks_file = std::env::var_os("DASHMARK_BOOKMARKS_FILE")
            .map(PathBuf::from)
            .or_else(chromium::default_bookmarks_path);

        Ok(Self {
            config_file,
            state_file,
            bookmarks_file,
        })
    }
}

pub struct DaemonRuntime {
    config: DaemonConfig,
    engine: Arc<SyncEngine<MemoryTree>>,
}

impl DaemonRuntime {
    pub async fn bootstrap(config: DaemonConfig) -> anyhow::Result<Self> {
        for file in [&config.config_file, &config.state_file] {
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create directory at {parent:?}"))?;
            }
        }

        let config_store = ConfigStore::new(config.config_file.clone());
        let sync_config = config_store
            .load()
            .context("failed to load sync configuration")?;
        let api_url = sync_config
            .validate_api_url()
            .context("invalid bookmark store URL")?;
        let client =
            StoreClient::with_base_url(api_url.as_str()).context("failed to build store client")?;

        let roots = match &config.bookmarks_file {
            Some(path) => match chromium::load_bookmarks_file(path) {
                Ok(roots) => roots,
                Err(err) => {
                    eprintln!(
                        "[dashmarkd] warning: failed to read bookmarks file {}: {err}",
                        path.display()
                    );
                    Vec::new()
                }
            },
            None => {
                eprintln!("[dashmarkd] warning: no browser bookmarks file found");
                Vec::new()
            }
        };

        let engine = Arc::new(SyncEngine::new(
            client,
            MemoryTree::new(roots),
            config_store,
            StateStore::new(config.state_file.clone()),
        ));

        Ok(Self { config, engine })
    }

    /// Run a single full-sync pass and exit; the `--once` mode.
    pub async fn run_once(self) -> anyhow::Result<()> {
        match self.engine.full_sync().await? {
            Some(delta) => eprintln!("[dashmarkd] full sync complete: {}", delta.summary()),
            None => eprintln!("[dashmarkd] sync is disabled or no folders are watched"),
        }
        Ok(())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        eprintln!(
            "[dashmarkd] started: config={}, state={}, bookmarks={}",
            self.config.config_file.display(),
            self.config.state_file.display(),
            self.config
                .bookmarks_file
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let dbus_connection = ConnectionBuilder::session()?
            .name(DBUS_NAME_SYNC)?
            .serve_at(
                DBUS_OBJECT_PATH_SYNC,
                SyncControlService::with_engine(Arc::clone(&self.engine)),
            )?
            .build()
            .await
            .context("failed to start D-Bus object server")?;

        let signal_emitter = SignalEmitter::new(&dbus_connection, DBUS_OBJECT_PATH_SYNC)
            .context("failed to create D-Bus signal emitter")?
            .into_owned();

        // The browser rewrites its bookmarks file on every change; each
        // rewrite is reloaded, diffed against the previous snapshot, and
        // replayed through the incremental handlers.
        let mut watcher = None;
        let mut watcher_handle = None;
        if let Some(path) = self.config.bookmarks_file.clone() {
            match watch_bookmarks_file(&path) {
                Ok((active_watcher, mut rx)) => {
                    watcher = Some(active_watcher);
                    let engine = Arc::clone(&self.engine);
                    watcher_handle = Some(tokio::spawn(async move {
                        let mut previous = engine.tree().roots().await;
                        while rx.recv().await.is_some() {
                            let roots = match chromium::load_bookmarks_file(&path) {
                                Ok(roots) => roots,
                                Err(err) => {
                                    eprintln!("[dashmarkd] bookmarks reload error: {err}");
                                    continue;
                                }
                            };
                            let events = diff_tree(&previous, &roots);
                            engine.tree().replace(roots.clone()).await;
                            previous = roots;
                            for event in events {
                                if let Err(err) = engine.handle_event(&event).await {
                                    eprintln!("[dashmarkd] event sync error: {err}");
                                }
                            }
                        }
                    }));
                }
                Err(err) => {
                    eprintln!("[dashmarkd] warning: failed to watch bookmarks file: {err}");
                }
            }
        }

        let engine_for_sync = Arc::clone(&self.engine);
        let sync_handle = tokio::spawn(async move {
            loop {
                match engine_for_sync.full_sync().await {
                    Ok(Some(delta)) => {
                        if !delta.is_empty() {
                            eprintln!("[dashmarkd] full sync delta: {}", delta.summary());
                        }
                        let _ =
                            SyncControlService::sync_complete(&signal_emitter, true, &delta.summary())
                                .await;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        eprintln!("[dashmarkd] full sync error: {err}");
                        let _ =
                            SyncControlService::sync_complete(&signal_emitter, false, &err.to_string())
                                .await;
                    }
                }
                tokio::time::sleep(sync_interval(engine_for_sync.config_store().load())).await;
            }
        });

        let _watcher = watcher;
        tokio::signal::ctrl_c()
            .await
            .context("failed waiting for shutdown signal")?;

        sync_handle.abort();
        if let Some(handle) = watcher_handle {
            handle.abort();
        }

        Ok(())
    }
}

/// Interval between periodic passes, re-read from configuration each time
/// so updates apply without a restart.
fn sync_interval(config: Result<SyncConfig, ConfigError>) -> Duration {
    let minutes = config
        .map(|config| config.sync_interval_min.max(1))
        .unwrap_or(DEFAULT_SYNC_INTERVAL_MIN);
    Duration::from_secs(minutes * 60)
}
