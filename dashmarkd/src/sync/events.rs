use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::tree::{BookmarkNode, NodeSummary, index_tree};

/// The four browser bookmark change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    Created { id: String, node: NodeSummary },
    Removed { id: String },
    Changed { id: String, change: NodeChange },
    Moved { id: String, info: MoveInfo },
}

/// Edited fields of a node; unset fields were untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeChange {
    pub title: Option<String>,
    pub url: Option<String>,
}

impl NodeChange {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveInfo {
    pub old_parent_id: Option<String>,
    pub parent_id: Option<String>,
}

/// Derive the change-event batch between two tree snapshots: removals, then
/// moves, then edits, then creations. A node that both moved and was edited
/// produces both events.
pub fn diff_tree(old: &[BookmarkNode], new: &[BookmarkNode]) -> Vec<TreeEvent> {
    let old_index = index_tree(old);
    let new_index = index_tree(new);

    let mut removed = Vec::new();
    let mut moved = Vec::new();
    let mut changed = Vec::new();
    let mut created = Vec::new();

    for id in old_index.keys() {
        if !new_index.contains_key(id) {
            removed.push(TreeEvent::Removed { id: id.clone() });
        }
    }

    for (id, node) in &new_index {
        let Some(previous) = old_index.get(id) else {
            created.push(TreeEvent::Created {
                id: id.clone(),
                node: node.clone(),
            });
            continue;
        };
        if previous.parent_id != node.parent_id {
            moved.push(TreeEvent::Moved {
                id: id.clone(),
                info: MoveInfo {
                    old_parent_id: previous.parent_id.clone(),
                    parent_id: node.parent_id.clone(),
                },
            });
        }
        let change = NodeChange {
            title: (previous.title != node.title).then(|| node.title.clone()),
            url: (previous.url != node.url)
                .then(|| node.url.clone())
                .flatten(),
        };
        if !change.is_empty() {
            changed.push(TreeEvent::Changed {
                id: id.clone(),
                change,
            });
        }
    }

    let mut events = removed;
    events.append(&mut moved);
    events.append(&mut changed);
    events.append(&mut created);
    events
}

/// Watch the browser's bookmarks file for rewrites. The browser replaces the
/// file atomically, so the watcher sits on the parent directory and filters
/// for the file itself; each hit is a cue to reload and diff.
pub fn watch_bookmarks_file(
    file: &Path,
) -> notify::Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let target = file.to_path_buf();
    let dir = file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            )
            && event.paths.iter().any(|path| path == &target)
        {
            let _ = tx.send(());
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok((watcher, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tree::{folder, link};

    fn base_tree() -> Vec<BookmarkNode> {
        vec![folder(
            "1",
            "Bar",
            vec![
                folder("10", "Dev", vec![link("100", "Repo", "https://git.example/x")]),
                folder("11", "Misc", vec![]),
            ],
        )]
    }

    #[test]
    fn identical_trees_produce_no_events() {
        assert!(diff_tree(&base_tree(), &base_tree()).is_empty());
    }

    #[test]
    fn new_node_produces_created_with_parent() {
        let mut new = base_tree();
        new[0].children[0]
            .children
            .push(link("101", "Docs", "https://docs.example"));
        let events = diff_tree(&base_tree(), &new);
        assert_eq!(events.len(), 1);
        match &events[0] {
            TreeEvent::Created { id, node } => {
                assert_eq!(id, "101");
                assert_eq!(node.parent_id.as_deref(), Some("10"));
                assert_eq!(node.url.as_deref(), Some("https://docs.example"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn missing_node_produces_removed() {
        let mut new = base_tree();
        new[0].children[0].children.clear();
        let events = diff_tree(&base_tree(), &new);
        assert_eq!(events, vec![TreeEvent::Removed { id: "100".into() }]);
    }

    #[test]
    fn title_edit_produces_changed_with_title_only() {
        let mut new = base_tree();
        new[0].children[0].children[0].title = "Repository".into();
        let events = diff_tree(&base_tree(), &new);
        assert_eq!(
            events,
            vec![TreeEvent::Changed {
                id: "100".into(),
                change: NodeChange {
                    title: Some("Repository".into()),
                    url: None,
                },
            }]
        );
    }

    #[test]
    fn reparenting_produces_moved() {
        let mut new = base_tree();
        let bookmark = new[0].children[0].children.remove(0);
        new[0].children[1].children.push(bookmark);
        let events = diff_tree(&base_tree(), &new);
        assert_eq!(
            events,
            vec![TreeEvent::Moved {
                id: "100".into(),
                info: MoveInfo {
                    old_parent_id: Some("10".into()),
                    parent_id: Some("11".into()),
                },
            }]
        );
    }

    #[test]
    fn removals_are_emitted_before_creations() {
        let mut new = base_tree();
        new[0].children[0].children[0] = link("200", "Repo", "https://git.example/x");
        let events = diff_tree(&base_tree(), &new);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], TreeEvent::Removed { id } if id == "100"));
        assert!(matches!(&events[1], TreeEvent::Created { id, .. } if id == "200"));
    }
}
