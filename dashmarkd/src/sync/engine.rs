use std::collections::{HashMap, HashSet};

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use dashmark_core::{BookmarkPatch, BookmarksDocument, Category, NewBookmark, StoreClient};

use super::events::{MoveInfo, NodeChange, TreeEvent};
use super::state::{StateError, StateStore, SyncMap};
use super::tree::{LeafGroup, NodeSummary, TreeSource, dedup_watched, flatten_folders};
use crate::config::{ConfigError, ConfigStore};

pub const DEFAULT_BOOKMARK_ICON: &str = "default";
pub const DEFAULT_BOOKMARK_COLOR: &str = "#6366f1";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] dashmark_core::StoreError),
    #[error("sync state error: {0}")]
    State(#[from] StateError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("time format error: {0}")]
    Time(#[from] time::error::Format),
}

/// Counters for one full reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncDelta {
    pub created_categories: usize,
    pub relinked_categories: usize,
    pub created_bookmarks: usize,
    pub deleted_bookmarks: usize,
    pub failed_groups: usize,
}

impl SyncDelta {
    pub fn is_empty(&self) -> bool {
        *self == SyncDelta::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "categories +{} ~{}, bookmarks +{} -{}, failed groups {}",
            self.created_categories,
            self.relinked_categories,
            self.created_bookmarks,
            self.deleted_bookmarks,
            self.failed_groups
        )
    }
}

/// Store category name for a flattened folder path. An empty prefix drops
/// the separator entirely.
pub fn category_name(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix} · {path}")
    }
}

/// Working set of one full-sync pass. The name lookup and the per-category
/// URL additions keep later groups from duplicating what earlier groups in
/// the same pass already created.
struct Pass {
    snapshot: BookmarksDocument,
    lookup: HashMap<String, Category>,
    added_urls: HashMap<String, HashSet<String>>,
    map: SyncMap,
    delta: SyncDelta,
}

/// Reconciles the browser's bookmark tree into the dashboard store: a
/// periodic idempotent full pass plus event-driven incremental updates.
/// Sync state is read whole and written whole on every entry point; the
/// full pass is the recovery mechanism for anything the incremental
/// handlers miss.
pub struct SyncEngine<S> {
    client: StoreClient,
    tree: S,
    config: ConfigStore,
    state: StateStore,
}

impl<S: TreeSource> SyncEngine<S> {
    pub fn new(client: StoreClient, tree: S, config: ConfigStore, state: StateStore) -> Self {
        Self {
            client,
            tree,
            config,
            state,
        }
    }

    pub fn tree(&self) -> &S {
        &self.tree
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config
    }

    /// Reconcile the store against the live tree. Returns `None` when sync
    /// is disabled or no folders are watched. A failed snapshot read aborts
    /// the pass with sync state untouched; a failure inside one group is
    /// logged and does not stop the remaining groups.
    pub async fn full_sync(&self) -> Result<Option<SyncDelta>, EngineError> {
        let config = self.config.load()?;
        if !config.enabled || config.watched_folders.is_empty() {
            return Ok(None);
        }

        let snapshot = self.client.get_bookmarks().await?;
        let map = self.state.load()?;

        let roots = self.tree.roots().await;
        let watched = dedup_watched(&roots, &config.watched_folders);

        // First match wins per name so relinking is deterministic.
        let mut lookup: HashMap<String, Category> = HashMap::new();
        for category in &snapshot.categories {
            lookup
                .entry(category.name.clone())
                .or_insert_with(|| category.clone());
        }

        let mut pass = Pass {
            snapshot,
            lookup,
            added_urls: HashMap::new(),
            map,
            delta: SyncDelta::default(),
        };

        for watched_root in &watched {
            for group in flatten_folders(watched_root) {
                let name = category_name(&config.category_prefix, &group.path);
                if let Err(err) = self.sync_group(&group, &name, &mut pass).await {
                    eprintln!("[dashmarkd] sync failed for '{}': {err}", group.path);
                    pass.delta.failed_groups += 1;
                }
            }
        }

        self.state.save(&pass.map)?;
        let stamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
        self.config.update(|config| config.last_sync = Some(stamp))?;

        Ok(Some(pass.delta))
    }

    async fn sync_group(
        &self,
        group: &LeafGroup,
        name: &str,
        pass: &mut Pass,
    ) -> Result<(), EngineError> {
        let category = if group.bookmarks.is_empty() {
            // A bookmark-less folder never becomes a category, but one
            // synced earlier still has its store bookmarks swept against
            // the now-empty browser side.
            match pass
                .map
                .categories
                .get(&group.folder_id)
                .and_then(|id| pass.snapshot.categories.iter().find(|c| &c.id == id))
            {
                Some(category) => category.clone(),
                None => return Ok(()),
            }
        } else {
            self.resolve_category(group, name, pass).await?
        };

        let added = pass.added_urls.entry(category.id.clone()).or_default();
        let mut store_urls: HashSet<String> = category
            .bookmarks
            .iter()
            .map(|bookmark| bookmark.url.clone())
            .collect();
        store_urls.extend(added.iter().cloned());
        let browser_urls: HashSet<&str> = group
            .bookmarks
            .iter()
            .map(|bookmark| bookmark.url.as_str())
            .collect();

        for bookmark in &group.bookmarks {
            if store_urls.contains(&bookmark.url) {
                continue;
            }
            let created = self
                .client
                .create_bookmark(
                    &category.id,
                    &NewBookmark {
                        name: if bookmark.title.is_empty() {
                            bookmark.url.clone()
                        } else {
                            bookmark.title.clone()
                        },
                        url: bookmark.url.clone(),
                        icon: DEFAULT_BOOKMARK_ICON.to_string(),
                        color: DEFAULT_BOOKMARK_COLOR.to_string(),
                    },
                )
                .await?;
            pass.map.bookmarks.insert(bookmark.id.clone(), created.id);
            store_urls.insert(bookmark.url.clone());
            added.insert(bookmark.url.clone());
            pass.delta.created_bookmarks += 1;
        }

        for existing in &category.bookmarks {
            if browser_urls.contains(existing.url.as_str()) {
                continue;
            }
            // Only bookmarks this engine created are ours to delete.
            if !pass.map.bookmark_is_synced(&existing.id) {
                continue;
            }
            self.client.delete_bookmark(&category.id, &existing.id).await?;
            pass.map.remove_bookmark_by_store_id(&existing.id);
            pass.delta.deleted_bookmarks += 1;
        }

        Ok(())
    }

    /// Category resolution order: the persisted ID mapping, then an
    /// existing category with the expected name, then creation. The name
    /// fallback repairs mappings lost to a partial earlier failure.
    async fn resolve_category(
        &self,
        group: &LeafGroup,
        name: &str,
        pass: &mut Pass,
    ) -> Result<Category, EngineError> {
        if let Some(category) = pass
            .map
            .categories
            .get(&group.folder_id)
            .and_then(|id| pass.snapshot.categories.iter().find(|c| &c.id == id))
        {
            return Ok(category.clone());
        }

        if let Some(category) = pass.lookup.get(name) {
            pass.map
                .categories
                .insert(group.folder_id.clone(), category.id.clone());
            pass.delta.relinked_categories += 1;
            eprintln!("[dashmarkd] relinked category by name: {name}");
            return Ok(category.clone());
        }

        let category = self.client.create_category(name).await?;
        pass.map
            .categories
            .insert(group.folder_id.clone(), category.id.clone());
        pass.lookup.insert(name.to_string(), category.clone());
        pass.delta.created_categories += 1;
        eprintln!("[dashmarkd] created category: {name}");
        Ok(category)
    }

    /// Dispatch one tree change notification to its handler.
    pub async fn handle_event(&self, event: &TreeEvent) -> Result<(), EngineError> {
        match event {
            TreeEvent::Created { id, node } => self.handle_created(id, node).await,
            TreeEvent::Removed { id } => self.handle_removed(id).await,
            TreeEvent::Changed { id, change } => self.handle_changed(id, change).await,
            TreeEvent::Moved { id, info } => self.handle_moved(id, info).await,
        }
    }

    pub async fn handle_created(&self, id: &str, node: &NodeSummary) -> Result<(), EngineError> {
        let config = self.config.load()?;
        if !config.enabled {
            return Ok(());
        }
        let Some(url) = node.url.as_deref() else {
            // Folders are picked up by the next full pass.
            return Ok(());
        };
        if self
            .find_watched_ancestor(node.parent_id.as_deref(), &config.watched_folders)
            .await
            .is_none()
        {
            return Ok(());
        }
        let Some(parent_id) = node.parent_id.as_deref() else {
            return Ok(());
        };

        let mut map = self.state.load()?;
        let Some(category_id) = map.categories.get(parent_id).cloned() else {
            // The subfolder has no category yet; category resolution
            // belongs to the full pass.
            self.full_sync().await?;
            return Ok(());
        };

        // Fresh read so racing create events cannot double-add a URL.
        let snapshot = self.client.get_bookmarks().await?;
        if let Some(category) = snapshot.categories.iter().find(|c| c.id == category_id)
            && category.bookmarks.iter().any(|b| b.url == url)
        {
            eprintln!("[dashmarkd] skip duplicate: {url}");
            return Ok(());
        }

        let created = self
            .client
            .create_bookmark(
                &category_id,
                &NewBookmark {
                    name: if node.title.is_empty() {
                        url.to_string()
                    } else {
                        node.title.clone()
                    },
                    url: url.to_string(),
                    icon: DEFAULT_BOOKMARK_ICON.to_string(),
                    color: DEFAULT_BOOKMARK_COLOR.to_string(),
                },
            )
            .await?;
        map.bookmarks.insert(id.to_string(), created.id);
        self.state.save(&map)?;
        Ok(())
    }

    pub async fn handle_removed(&self, id: &str) -> Result<(), EngineError> {
        let config = self.config.load()?;
        if !config.enabled {
            return Ok(());
        }
        let mut map = self.state.load()?;

        if let Some(store_bookmark_id) = map.bookmarks.get(id).cloned() {
            // The map does not record which category holds the bookmark;
            // try every known category, stopping at the first success. An
            // exhausted search means the target is already gone.
            let category_ids: Vec<String> = map.categories.values().cloned().collect();
            for category_id in &category_ids {
                if self
                    .client
                    .delete_bookmark(category_id, &store_bookmark_id)
                    .await
                    .is_ok()
                {
                    map.bookmarks.remove(id);
                    self.state.save(&map)?;
                    eprintln!("[dashmarkd] removed synced bookmark for node {id}");
                    break;
                }
            }
        }

        // A removed node can also be a synced subfolder with its own
        // category; the checks are independent.
        if let Some(category_id) = map.categories.get(id).cloned() {
            match self.client.delete_category(&category_id).await {
                Ok(()) => {
                    map.categories.remove(id);
                    self.state.save(&map)?;
                    eprintln!("[dashmarkd] removed category for folder {id}");
                }
                Err(err) => {
                    eprintln!("[dashmarkd] failed to remove category for folder {id}: {err}");
                }
            }
        }
        Ok(())
    }

    pub async fn handle_changed(&self, id: &str, change: &NodeChange) -> Result<(), EngineError> {
        let config = self.config.load()?;
        if !config.enabled {
            return Ok(());
        }
        let map = self.state.load()?;
        let Some(store_bookmark_id) = map.bookmarks.get(id) else {
            return Ok(());
        };
        let patch = BookmarkPatch {
            name: change.title.clone(),
            url: change.url.clone(),
            ..BookmarkPatch::default()
        };
        if patch.is_empty() {
            return Ok(());
        }
        for category_id in map.categories.values() {
            if self
                .client
                .update_bookmark(category_id, store_bookmark_id, &patch)
                .await
                .is_ok()
            {
                eprintln!("[dashmarkd] updated synced bookmark for node {id}");
                return Ok(());
            }
        }
        Ok(())
    }

    pub async fn handle_moved(&self, id: &str, info: &MoveInfo) -> Result<(), EngineError> {
        let config = self.config.load()?;
        if !config.enabled {
            return Ok(());
        }
        let was_watched = self
            .find_watched_ancestor(info.old_parent_id.as_deref(), &config.watched_folders)
            .await
            .is_some();
        let now_watched = self
            .find_watched_ancestor(info.parent_id.as_deref(), &config.watched_folders)
            .await
            .is_some();

        if was_watched && !now_watched {
            return self.handle_removed(id).await;
        }
        if now_watched && (!was_watched || info.old_parent_id != info.parent_id) {
            if was_watched {
                self.handle_removed(id).await?;
            }
            // The move payload is partial; re-read the node for its
            // current title and URL.
            if let Some(node) = self.tree.node(id).await {
                self.handle_created(id, &node).await?;
            }
        }
        Ok(())
    }

    /// Walk parent pointers from `start` until a watched folder or a root
    /// is reached. A vanished node mid-walk reads as "not watched".
    async fn find_watched_ancestor(
        &self,
        start: Option<&str>,
        watched: &[String],
    ) -> Option<String> {
        let mut current = start?.to_string();
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(current.clone()) {
                return None;
            }
            if watched.iter().any(|id| *id == current) {
                return Some(current);
            }
            current = self.tree.node(&current).await?.parent_id?;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
