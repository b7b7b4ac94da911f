mod client;

pub use client::{
    Bookmark, BookmarkPatch, BookmarksDocument, Category, NewBookmark, StoreClient, StoreError,
};
