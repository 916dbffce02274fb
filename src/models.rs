//! Core data models shared by the workspace manager, the indexer and the
//! HTTP server.

use serde::Serialize;
use std::path::PathBuf;

/// A per-user workspace on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub user_id: String,
    pub root: PathBuf,
}

/// A file found beneath a workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path relative to the workspace root.
    pub file_path: String,
    pub name: String,
}

/// A markdown file as stored by an [`Indexer`](crate::indexer::Indexer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedFile {
    pub id: String,
    /// Path relative to the indexer's base directory (e.g. `user-alice/docs/a.md`).
    pub file_path: String,
    /// `file_path` without its extension, `/`-separated.
    pub url_path: String,
    /// First component of `file_path` (the workspace directory name).
    pub folder: String,
    pub extension: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub content: String,
}

/// Result of storing an uploaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub size: u64,
}

/// Counters reported by [`Indexer::index_folder`](crate::indexer::Indexer::index_folder).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub scanned: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub removed: u64,
}
