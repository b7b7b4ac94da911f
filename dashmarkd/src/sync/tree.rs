use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A node of the browser's bookmark hierarchy. Folders have `url: None`;
/// URL bookmarks carry no children.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookmarkNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub children: Vec<BookmarkNode>,
}

/// Point-query view of a single node; `parent_id` is derived from the
/// tree shape, `None` for roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
}

/// The seam between the synchronizer and the host browser: a full-tree read
/// plus a point query, both suspension points.
pub trait TreeSource: Send + Sync {
    fn roots(&self) -> impl Future<Output = Vec<BookmarkNode>> + Send;
    fn node(&self, id: &str) -> impl Future<Output = Option<NodeSummary>> + Send;
}

pub fn index_tree(roots: &[BookmarkNode]) -> HashMap<String, NodeSummary> {
    let mut index = HashMap::new();
    fn walk(nodes: &[BookmarkNode], parent: Option<&str>, index: &mut HashMap<String, NodeSummary>) {
        for node in nodes {
            index.insert(
                node.id.clone(),
                NodeSummary {
                    id: node.id.clone(),
                    parent_id: parent.map(str::to_string),
                    title: node.title.clone(),
                    url: node.url.clone(),
                },
            );
            walk(&node.children, Some(&node.id), index);
        }
    }
    walk(roots, None, &mut index);
    index
}

#[derive(Default)]
struct Snapshot {
    roots: Vec<BookmarkNode>,
    index: HashMap<String, NodeSummary>,
}

impl Snapshot {
    fn build(roots: Vec<BookmarkNode>) -> Self {
        let index = index_tree(&roots);
        Self { roots, index }
    }
}

/// Indexed in-memory snapshot of the browser tree. The daemon refreshes it
/// from the profile file; tests drive it directly via [`MemoryTree::replace`].
#[derive(Default)]
pub struct MemoryTree {
    inner: RwLock<Snapshot>,
}

impl MemoryTree {
    pub fn new(roots: Vec<BookmarkNode>) -> Self {
        Self {
            inner: RwLock::new(Snapshot::build(roots)),
        }
    }

    pub async fn replace(&self, roots: Vec<BookmarkNode>) {
        *self.inner.write().await = Snapshot::build(roots);
    }
}

impl TreeSource for MemoryTree {
    async fn roots(&self) -> Vec<BookmarkNode> {
        self.inner.read().await.roots.clone()
    }

    async fn node(&self, id: &str) -> Option<NodeSummary> {
        self.inner.read().await.index.get(id).cloned()
    }
}

/// Resolve the watched-folder set against the live tree in pre-order,
/// dropping any watched folder that sits under another watched folder so a
/// doubly-watched subtree is processed once.
pub fn dedup_watched(roots: &[BookmarkNode], watched: &[String]) -> Vec<BookmarkNode> {
    let mut found = Vec::new();
    fn visit(
        nodes: &[BookmarkNode],
        watched: &[String],
        under_watched: bool,
        found: &mut Vec<BookmarkNode>,
    ) {
        for node in nodes {
            let selected = !under_watched && watched.iter().any(|id| *id == node.id);
            if selected {
                found.push(node.clone());
            }
            visit(&node.children, watched, under_watched || selected, found);
        }
    }
    visit(roots, watched, false, &mut found);
    found
}

/// A subfolder of a watched folder, identified by its node ID and a display
/// path of " / "-joined folder titles from the watched root down, with its
/// direct URL bookmarks. A folder without direct bookmarks yields an empty
/// group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafGroup {
    pub folder_id: String,
    pub path: String,
    pub bookmarks: Vec<LeafBookmark>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafBookmark {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Flatten a watched folder's subtree into one group per folder, pre-order.
/// Recomputed from the live tree on every pass, never persisted.
pub fn flatten_folders(folder: &BookmarkNode) -> Vec<LeafGroup> {
    let mut groups = Vec::new();
    collect_groups(folder, "", &mut groups);
    groups
}

fn collect_groups(folder: &BookmarkNode, parent_path: &str, groups: &mut Vec<LeafGroup>) {
    let path = if parent_path.is_empty() {
        folder.title.clone()
    } else {
        format!("{parent_path} / {}", folder.title)
    };

    let bookmarks: Vec<LeafBookmark> = folder
        .children
        .iter()
        .filter_map(|child| {
            child.url.as_ref().map(|url| LeafBookmark {
                id: child.id.clone(),
                title: child.title.clone(),
                url: url.clone(),
            })
        })
        .collect();
    groups.push(LeafGroup {
        folder_id: folder.id.clone(),
        path: path.clone(),
        bookmarks,
    });

    for child in &folder.children {
        if child.url.is_none() {
            collect_groups(child, &path, groups);
        }
    }
}

#[cfg(test)]
pub(crate) fn folder(id: &str, title: &str, children: Vec<BookmarkNode>) -> BookmarkNode {
    BookmarkNode {
        id: id.into(),
        title: title.into(),
        url: None,
        children,
    }
}

#[cfg(test)]
pub(crate) fn link(id: &str, title: &str, url: &str) -> BookmarkNode {
    BookmarkNode {
        id: id.into(),
        title: title.into(),
        url: Some(url.into()),
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<BookmarkNode> {
        vec![folder(
            "0",
            "",
            vec![folder(
                "1",
                "Bookmarks bar",
                vec![
                    folder(
                        "10",
                        "Dev",
                        vec![
                            link("100", "Repo", "https://git.example/x"),
                            folder(
                                "11",
                                "Tools",
                                vec![link("110", "CI", "https://ci.example")],
                            ),
                            folder("12", "Empty", vec![]),
                        ],
                    ),
                    link("20", "News", "https://news.example"),
                ],
            )],
        )]
    }

    #[test]
    fn flatten_collects_subfolders_with_paths_preorder() {
        let tree = sample_tree();
        let dev = &tree[0].children[0].children[0];
        let groups = flatten_folders(dev);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].folder_id, "10");
        assert_eq!(groups[0].path, "Dev");
        assert_eq!(groups[0].bookmarks[0].url, "https://git.example/x");
        assert_eq!(groups[1].folder_id, "11");
        assert_eq!(groups[1].path, "Dev / Tools");
        assert_eq!(groups[2].folder_id, "12");
        assert!(groups[2].bookmarks.is_empty());
    }

    #[test]
    fn flatten_builds_paths_through_bookmark_less_folders() {
        let root = folder(
            "5",
            "Top",
            vec![folder(
                "6",
                "Middle",
                vec![folder("7", "Deep", vec![link("70", "A", "https://a.example")])],
            )],
        );
        let groups = flatten_folders(&root);
        assert_eq!(groups.len(), 3);
        assert!(groups[0].bookmarks.is_empty());
        assert!(groups[1].bookmarks.is_empty());
        assert_eq!(groups[2].folder_id, "7");
        assert_eq!(groups[2].path, "Top / Middle / Deep");
        assert_eq!(groups[2].bookmarks.len(), 1);
    }

    #[test]
    fn dedup_watched_drops_descendants_of_watched_ancestors() {
        let tree = sample_tree();
        let watched = vec!["10".to_string(), "11".to_string()];
        let roots = dedup_watched(&tree, &watched);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, "10");
    }

    #[test]
    fn dedup_watched_keeps_unrelated_folders() {
        let tree = sample_tree();
        let watched = vec!["11".to_string(), "12".to_string()];
        let roots = dedup_watched(&tree, &watched);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].id, "11");
        assert_eq!(roots[1].id, "12");
    }

    #[test]
    fn dedup_watched_ignores_unknown_ids() {
        let tree = sample_tree();
        let watched = vec!["does-not-exist".to_string()];
        assert!(dedup_watched(&tree, &watched).is_empty());
    }

    #[tokio::test]
    async fn memory_tree_indexes_parents() {
        let tree = MemoryTree::new(sample_tree());
        let node = tree.node("110").await.unwrap();
        assert_eq!(node.parent_id.as_deref(), Some("11"));
        assert_eq!(node.url.as_deref(), Some("https://ci.example"));

        let missing = tree.node("404").await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn memory_tree_replace_swaps_the_snapshot() {
        let tree = MemoryTree::new(sample_tree());
        tree.replace(vec![link("9", "Only", "https://only.example")])
            .await;
        assert!(tree.node("110").await.is_none());
        assert_eq!(tree.roots().await.len(), 1);
    }
}
