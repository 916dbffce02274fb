//! In-memory [`Indexer`] implementation for testing and database-free runs.
//!
//! Uses a `HashMap` keyed by relative path behind `std::sync::RwLock`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::indexer::{FileQuery, Indexer, ScannedFile, Scanner};
use crate::models::{IndexStats, IndexedFile};

pub struct InMemoryIndexer {
    scanner: Scanner,
    files: RwLock<HashMap<String, ScannedFile>>,
}

impl InMemoryIndexer {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Indexer for InMemoryIndexer {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn index_folder(&self, folder: &Path) -> Result<IndexStats> {
        let prefix = self.scanner.relative_folder(folder)?;
        let scanner = self.scanner.clone();
        let owned = folder.to_path_buf();
        let scanned = tokio::task::spawn_blocking(move || scanner.scan(&owned)).await??;

        let mut files = self
            .files
            .write()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        let mut stats = IndexStats {
            scanned: scanned.len() as u64,
            ..Default::default()
        };

        let seen: Vec<String> = scanned.iter().map(|s| s.file.file_path.clone()).collect();
        let before = files.len();
        files.retain(|path, _| !is_under(path, &prefix) || seen.contains(path));
        stats.removed = (before - files.len()) as u64;

        for item in scanned {
            match files.get(&item.file.file_path) {
                Some(existing) if existing.hash == item.hash => stats.unchanged += 1,
                _ => {
                    stats.updated += 1;
                    files.insert(item.file.file_path.clone(), item);
                }
            }
        }

        Ok(stats)
    }

    async fn get_files(&self, query: &FileQuery) -> Result<Vec<IndexedFile>> {
        let files = self
            .files
            .read()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        Ok(files
            .values()
            .filter(|s| query.matches(&s.file))
            .map(|s| s.file.clone())
            .collect())
    }

    async fn shutdown(&self) {
        if let Ok(mut files) = self.files.write() {
            files.clear();
        }
    }
}

/// Whether relative path `path` lies under relative folder `prefix`.
pub(crate) fn is_under(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
