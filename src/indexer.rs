//! Markdown content index abstraction.
//!
//! The [`Indexer`] trait is the seam between the workspace manager and
//! whatever stores the parsed markdown of each workspace. Two backends ship:
//!
//! | Backend | Type | Use |
//! |---------|------|-----|
//! | `sqlite` | [`SqliteIndexer`](crate::index_sqlite::SqliteIndexer) | Default, persisted in one file |
//! | `memory` | [`InMemoryIndexer`](crate::index_memory::InMemoryIndexer) | Tests and throwaway runs |
//!
//! Both backends index paths relative to a single base directory (the
//! workspaces root), so the first path component of every indexed file is
//! the workspace directory name (`user-<id>`). [`FileQuery::folder`] filters
//! on that component.

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::Config;
use crate::markdown::parse_markdown;
use crate::models::{IndexStats, IndexedFile};

/// Filter for [`Indexer::get_files`].
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    /// Workspace directory name, e.g. `user-alice`.
    pub folder: Option<String>,
    /// Files must carry every listed tag.
    pub tags: Vec<String>,
}

impl FileQuery {
    pub fn folder(folder: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub(crate) fn matches(&self, file: &IndexedFile) -> bool {
        if let Some(folder) = &self.folder {
            if &file.folder != folder {
                return false;
            }
        }
        self.tags.iter().all(|t| file.tags.contains(t))
    }
}

/// A content index over markdown files.
///
/// Implementations own their connection state; [`shutdown`](Indexer::shutdown)
/// releases it. All methods are called from the tokio runtime.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Short backend name for logs (`"sqlite"`, `"memory"`).
    fn backend(&self) -> &str;

    /// (Re)index every matching file under `folder`, which must live beneath
    /// the indexer's base directory. Rows for files that disappeared from
    /// `folder` are removed.
    async fn index_folder(&self, folder: &Path) -> Result<IndexStats>;

    /// Enumerate indexed files matching `query`. Order is unspecified.
    async fn get_files(&self, query: &FileQuery) -> Result<Vec<IndexedFile>>;

    /// Release any held resources. Further calls may fail.
    async fn shutdown(&self) {}
}

/// Builds the configured indexer, or `None` when indexing is disabled.
pub async fn open_indexer(config: &Config) -> Result<Option<Arc<dyn Indexer>>> {
    use crate::index_memory::InMemoryIndexer;
    use crate::index_sqlite::SqliteIndexer;

    if !config.index.is_enabled() {
        return Ok(None);
    }

    let scanner = Scanner::new(&config.workspaces.root, &config.index.include_globs)?;
    let indexer: Arc<dyn Indexer> = match config.index.backend.as_str() {
        "sqlite" => Arc::new(SqliteIndexer::open(&config.index.path, scanner).await?),
        "memory" => Arc::new(InMemoryIndexer::new(scanner)),
        other => anyhow::bail!("Unknown index backend: '{}'", other),
    };
    Ok(Some(indexer))
}

/// A file read from disk and parsed, ready to be stored by a backend.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub file: IndexedFile,
    pub hash: String,
}

/// Walks folders beneath a base directory and parses matching markdown.
///
/// Shared by every backend so they agree on paths, ids and parsing.
#[derive(Debug, Clone)]
pub struct Scanner {
    base: PathBuf,
    include: GlobSet,
}

impl Scanner {
    pub fn new(base: &Path, include_globs: &[String]) -> Result<Self> {
        Ok(Self {
            base: base.to_path_buf(),
            include: build_globset(include_globs)?,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path of `folder` relative to the base directory, `/`-separated.
    pub fn relative_folder(&self, folder: &Path) -> Result<String> {
        let rel = folder.strip_prefix(&self.base).with_context(|| {
            format!(
                "{} is not beneath index base {}",
                folder.display(),
                self.base.display()
            )
        })?;
        Ok(to_slash(rel))
    }

    /// Reads and parses every matching file under `folder`. Hidden
    /// directories are not descended into.
    pub fn scan(&self, folder: &Path) -> Result<Vec<ScannedFile>> {
        let mut out = Vec::new();
        let walker = WalkDir::new(folder)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&self.base) {
                Ok(rel) => to_slash(rel),
                Err(_) => continue,
            };
            if !self.include.is_match(&rel) {
                continue;
            }
            let raw = match std::fs::read(entry.path()) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            out.push(self.parse(&rel, &raw));
        }

        Ok(out)
    }

    fn parse(&self, rel: &str, raw: &[u8]) -> ScannedFile {
        let mut hasher = Sha256::new();
        hasher.update(raw);
        let hash = hex::encode(hasher.finalize());

        let text = String::from_utf8_lossy(raw);
        let parsed = parse_markdown(&text);

        let path = Path::new(rel);
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let url_path = match rel.rsplit_once('.') {
            Some((stem, _)) if !extension.is_empty() => stem.to_string(),
            _ => rel.to_string(),
        };
        let folder = rel.split('/').next().unwrap_or_default().to_string();

        ScannedFile {
            file: IndexedFile {
                id: file_id(rel),
                file_path: rel.to_string(),
                url_path,
                folder,
                extension,
                title: parsed.title,
                tags: parsed.tags,
                metadata: parsed.metadata,
                content: parsed.body,
            },
            hash,
        }
    }
}

/// Stable id for an indexed path.
pub fn file_id(rel: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rel.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

pub(crate) fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn to_slash(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
