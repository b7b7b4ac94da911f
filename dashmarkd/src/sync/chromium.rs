use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::tree::BookmarkNode;

#[derive(Debug, Error)]
pub enum ChromiumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bookmarks file parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct BookmarksFile {
    #[serde(default)]
    roots: Roots,
}

#[derive(Debug, Default, Deserialize)]
struct Roots {
    #[serde(default)]
    bookmark_bar: Option<ChromiumNode>,
    #[serde(default)]
    other: Option<ChromiumNode>,
    #[serde(default)]
    synced: Option<ChromiumNode>,
}

#[derive(Debug, Deserialize)]
struct ChromiumNode {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    children: Vec<ChromiumNode>,
}

/// Read a Chromium-format `Bookmarks` profile file into the tree model.
/// The three well-known roots become top-level nodes.
pub fn load_bookmarks_file(path: &Path) -> Result<Vec<BookmarkNode>, ChromiumError> {
    let raw = fs::read_to_string(path)?;
    let file: BookmarksFile = serde_json::from_str(&raw)?;
    Ok(
        [file.roots.bookmark_bar, file.roots.other, file.roots.synced]
            .into_iter()
            .flatten()
            .map(map_node)
            .collect(),
    )
}

fn map_node(node: ChromiumNode) -> BookmarkNode {
    let url = if node.node_type == "folder" {
        None
    } else {
        node.url
    };
    BookmarkNode {
        id: node.id,
        title: node.name,
        url,
        children: node.children.into_iter().map(map_node).collect(),
    }
}

/// Locate the default browser profile's bookmarks file: an existing Chrome
/// profile wins, otherwise the Chromium path is assumed.
pub fn default_bookmarks_path() -> Option<PathBuf> {
    let config = dirs::config_dir()?;
    let chrome = config
        .join("google-chrome")
        .join("Default")
        .join("Bookmarks");
    if chrome.is_file() {
        return Some(chrome);
    }
    Some(config.join("chromium").join("Default").join("Bookmarks"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "checksum": "ignored",
        "version": 1,
        "roots": {
            "bookmark_bar": {
                "id": "1",
                "guid": "00000000-0000-4000-a000-000000000002",
                "name": "Bookmarks bar",
                "type": "folder",
                "children": [
                    {
                        "id": "10",
                        "name": "Dev",
                        "type": "folder",
                        "children": [
                            {
                                "id": "100",
                                "name": "Repo",
                                "type": "url",
                                "url": "https://git.example/x"
                            }
                        ]
                    }
                ]
            },
            "other": {
                "id": "2",
                "name": "Other bookmarks",
                "type": "folder",
                "children": []
            }
        }
    }"#;

    #[test]
    fn parses_roots_and_nesting() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), SAMPLE).unwrap();

        let roots = load_bookmarks_file(file.path()).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].id, "1");
        assert!(roots[0].url.is_none());

        let dev = &roots[0].children[0];
        assert_eq!(dev.title, "Dev");
        assert_eq!(dev.children[0].url.as_deref(), Some("https://git.example/x"));
    }

    #[test]
    fn folder_type_discards_stray_urls() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{ "roots": { "other": { "id": "2", "name": "Other", "type": "folder", "url": "https://bogus.example" } } }"#,
        )
        .unwrap();

        let roots = load_bookmarks_file(file.path()).unwrap();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].url.is_none());
    }

    #[test]
    fn missing_roots_yield_empty_tree() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{ "version": 1 }"#).unwrap();
        assert!(load_bookmarks_file(file.path()).unwrap().is_empty());
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let err = load_bookmarks_file(Path::new("/nonexistent/Bookmarks")).unwrap_err();
        assert!(matches!(err, ChromiumError::Io(_)));
    }
}
