//! File listing backends for `GET /api/workspace/{userId}/files`.
//!
//! Listing can come from a direct directory walk or from the content index.
//! Both sit behind [`FileLister`]; `[workspaces].listing` picks one.

use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::indexer::{is_hidden, FileQuery, Indexer};
use crate::models::{FileEntry, Workspace};

#[async_trait]
pub trait FileLister: Send + Sync {
    /// Flat, unordered snapshot of the files in `workspace`.
    async fn list(&self, workspace: &Workspace) -> WorkspaceResult<Vec<FileEntry>>;
}

/// Builds the lister selected by `[workspaces].listing`.
pub fn lister_for(config: &Config, indexer: Option<Arc<dyn Indexer>>) -> Arc<dyn FileLister> {
    match config.workspaces.listing.as_str() {
        "index" => Arc::new(IndexLister::new(indexer)),
        _ => Arc::new(WalkLister),
    }
}

/// Recursive walk of the workspace tree. Directories whose name starts with
/// a dot are skipped along with everything beneath them.
pub struct WalkLister;

#[async_trait]
impl FileLister for WalkLister {
    async fn list(&self, workspace: &Workspace) -> WorkspaceResult<Vec<FileEntry>> {
        let root = workspace.root.clone();
        let entries = tokio::task::spawn_blocking(move || walk(&root))
            .await
            .map_err(|e| WorkspaceError::Internal(e.into()))??;
        Ok(entries)
    }
}

fn walk(root: &std::path::Path) -> WorkspaceResult<Vec<FileEntry>> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_hidden(e.file_name())));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(io) => WorkspaceError::storage(&path, io),
                None => WorkspaceError::Internal(anyhow::anyhow!(
                    "filesystem loop at {}",
                    path.display()
                )),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        files.push(FileEntry {
            file_path: rel.to_string_lossy().to_string(),
            name: entry.file_name().to_string_lossy().to_string(),
        });
    }
    Ok(files)
}

/// Lists whatever the content index holds for the workspace folder. Only
/// indexed (markdown) files appear.
pub struct IndexLister {
    indexer: Option<Arc<dyn Indexer>>,
}

impl IndexLister {
    pub fn new(indexer: Option<Arc<dyn Indexer>>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl FileLister for IndexLister {
    async fn list(&self, workspace: &Workspace) -> WorkspaceResult<Vec<FileEntry>> {
        let indexer = self
            .indexer
            .as_ref()
            .ok_or_else(|| WorkspaceError::Unavailable("index not ready".to_string()))?;

        let folder = workspace
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let prefix = format!("{}/", folder);

        let files = indexer.get_files(&FileQuery::folder(folder)).await?;
        Ok(files
            .into_iter()
            .map(|f| {
                let rel = f
                    .file_path
                    .strip_prefix(&prefix)
                    .unwrap_or(&f.file_path)
                    .to_string();
                let name = rel.rsplit('/').next().unwrap_or(&rel).to_string();
                FileEntry {
                    file_path: rel,
                    name,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_memory::InMemoryIndexer;
    use crate::indexer::Scanner;
    use std::fs;
    use tempfile::TempDir;

    fn workspace(tmp: &TempDir) -> Workspace {
        let root = tmp.path().join("user-alice");
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join(".cache/deep")).unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();
        fs::write(root.join("docs/guide.md"), "# guide").unwrap();
        fs::write(root.join("docs/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join(".cache/deep/secret.md"), "# hidden").unwrap();
        fs::write(root.join(".env"), "KEY=1").unwrap();
        Workspace {
            user_id: "alice".into(),
            root,
        }
    }

    #[tokio::test]
    async fn test_walk_skips_hidden_directories() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);

        let mut files = WalkLister.list(&ws).await.unwrap();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        let paths: Vec<&str> = files.iter().map(|f| f.file_path.as_str()).collect();

        assert!(paths.contains(&"README.md"));
        assert!(paths.contains(&"docs/main.rs"));
        assert!(paths.iter().all(|p| !p.starts_with(".cache")));
        // hidden files are still listed; only hidden directories are skipped
        assert!(paths.contains(&".env"));
        let guide = files.iter().find(|f| f.name == "guide.md").unwrap();
        assert_eq!(guide.file_path, "docs/guide.md");
    }

    #[tokio::test]
    async fn test_index_lister_without_indexer_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        let err = IndexLister::new(None).list(&ws).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_index_lister_strips_folder() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        let idx = Arc::new(InMemoryIndexer::new(
            Scanner::new(tmp.path(), &["**/*.md".to_string()]).unwrap(),
        ));
        idx.index_folder(&ws.root).await.unwrap();

        let lister = IndexLister::new(Some(idx as Arc<dyn Indexer>));
        let mut files = lister.list(&ws).await.unwrap();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let paths: Vec<&str> = files.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "docs/guide.md"]);
        assert_eq!(files[1].name, "guide.md");
    }
}
