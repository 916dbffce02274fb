//! SQLite-backed [`Indexer`] implementation.
//!
//! Stores one row per markdown file in `files` and one row per tag in
//! `file_tags`. Re-indexing a folder compares content hashes and only
//! rewrites rows whose file changed.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::db;
use crate::index_memory::is_under;
use crate::indexer::{FileQuery, Indexer, ScannedFile, Scanner};
use crate::migrate;
use crate::models::{IndexStats, IndexedFile};

pub struct SqliteIndexer {
    pool: SqlitePool,
    scanner: Scanner,
}

impl SqliteIndexer {
    /// Connects to (creating if needed) the database at `path` and runs
    /// the schema migrations.
    pub async fn open(path: &Path, scanner: Scanner) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool, scanner })
    }

    async fn existing_hashes(&self, prefix: &str) -> Result<HashMap<String, String>> {
        let folder = prefix.split('/').next().unwrap_or_default();
        let rows = if folder.is_empty() {
            sqlx::query("SELECT file_path, hash FROM files")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT file_path, hash FROM files WHERE folder = ?")
                .bind(folder)
                .fetch_all(&self.pool)
                .await?
        };

        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("file_path"), r.get::<String, _>("hash")))
            .filter(|(path, _)| is_under(path, prefix))
            .collect())
    }
}

#[async_trait]
impl Indexer for SqliteIndexer {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn index_folder(&self, folder: &Path) -> Result<IndexStats> {
        let prefix = self.scanner.relative_folder(folder)?;
        let scanner = self.scanner.clone();
        let owned = folder.to_path_buf();
        let scanned = tokio::task::spawn_blocking(move || scanner.scan(&owned)).await??;

        let existing = self.existing_hashes(&prefix).await?;
        let now = chrono::Utc::now().timestamp();
        let mut stats = IndexStats {
            scanned: scanned.len() as u64,
            ..Default::default()
        };

        let mut tx = self.pool.begin().await?;

        let seen: HashSet<&str> = scanned.iter().map(|s| s.file.file_path.as_str()).collect();
        for path in existing.keys().filter(|p| !seen.contains(p.as_str())) {
            sqlx::query("DELETE FROM files WHERE file_path = ?")
                .bind(path)
                .execute(&mut *tx)
                .await?;
            stats.removed += 1;
        }

        for ScannedFile { file, hash } in &scanned {
            if existing.get(&file.file_path) == Some(hash) {
                stats.unchanged += 1;
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO files (id, file_path, url_path, folder, extension, title,
                                   metadata_json, content, hash, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(file_path) DO UPDATE SET
                    url_path = excluded.url_path,
                    folder = excluded.folder,
                    extension = excluded.extension,
                    title = excluded.title,
                    metadata_json = excluded.metadata_json,
                    content = excluded.content,
                    hash = excluded.hash,
                    indexed_at = excluded.indexed_at
                "#,
            )
            .bind(&file.id)
            .bind(&file.file_path)
            .bind(&file.url_path)
            .bind(&file.folder)
            .bind(&file.extension)
            .bind(&file.title)
            .bind(file.metadata.to_string())
            .bind(&file.content)
            .bind(hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM file_tags WHERE file_id = ?")
                .bind(&file.id)
                .execute(&mut *tx)
                .await?;
            for tag in &file.tags {
                sqlx::query("INSERT OR IGNORE INTO file_tags (file_id, tag) VALUES (?, ?)")
                    .bind(&file.id)
                    .bind(tag)
                    .execute(&mut *tx)
                    .await?;
            }

            stats.updated += 1;
        }

        tx.commit().await?;
        Ok(stats)
    }

    async fn get_files(&self, query: &FileQuery) -> Result<Vec<IndexedFile>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, file_path, url_path, folder, extension, title, metadata_json, content \
             FROM files WHERE 1 = 1",
        );
        if let Some(folder) = &query.folder {
            qb.push(" AND folder = ").push_bind(folder.clone());
        }
        if !query.tags.is_empty() {
            let wanted: HashSet<&String> = query.tags.iter().collect();
            qb.push(" AND id IN (SELECT file_id FROM file_tags WHERE tag IN (");
            let mut sep = qb.separated(", ");
            for tag in &wanted {
                sep.push_bind((*tag).clone());
            }
            qb.push(") GROUP BY file_id HAVING COUNT(DISTINCT tag) = ")
                .push_bind(wanted.len() as i64)
                .push(")");
        }

        let rows = qb.build().fetch_all(&self.pool).await?;

        let tag_rows = match &query.folder {
            Some(folder) => {
                sqlx::query(
                    "SELECT t.file_id, t.tag FROM file_tags t JOIN files f ON f.id = t.file_id \
                     WHERE f.folder = ? ORDER BY t.tag",
                )
                .bind(folder)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT file_id, tag FROM file_tags ORDER BY tag")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        for row in &tag_rows {
            tags.entry(row.get("file_id"))
                .or_default()
                .push(row.get("tag"));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let metadata_json: String = row.get("metadata_json");
                IndexedFile {
                    tags: tags.remove(&id).unwrap_or_default(),
                    id,
                    file_path: row.get("file_path"),
                    url_path: row.get("url_path"),
                    folder: row.get("folder"),
                    extension: row.get("extension"),
                    title: row.get("title"),
                    metadata: serde_json::from_str(&metadata_json)
                        .unwrap_or(serde_json::json!({})),
                    content: row.get("content"),
                }
            })
            .collect())
    }

    async fn shutdown(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    async fn open(tmp: &TempDir) -> SqliteIndexer {
        let base = tmp.path().join("workspaces");
        fs::create_dir_all(&base).unwrap();
        let scanner = Scanner::new(&base, &["**/*.md".to_string()]).unwrap();
        SqliteIndexer::open(&tmp.path().join("data/index.sqlite"), scanner)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_and_filter_by_tags() {
        let tmp = TempDir::new().unwrap();
        let idx = open(&tmp).await;
        let ws = tmp.path().join("workspaces/user-alice");
        fs::create_dir_all(ws.join("notes")).unwrap();
        fs::write(
            ws.join("notes/a.md"),
            "---\ntitle: Alpha\ntags: [rust, web]\n---\nAxum handlers",
        )
        .unwrap();
        fs::write(ws.join("notes/b.md"), "---\ntags: [rust]\n---\n# Beta\n").unwrap();

        let stats = idx.index_folder(&ws).await.unwrap();
        assert_eq!(stats.updated, 2);

        let all = idx.get_files(&FileQuery::folder("user-alice")).await.unwrap();
        assert_eq!(all.len(), 2);

        let both = idx
            .get_files(&FileQuery::folder("user-alice").with_tags(vec!["rust".into(), "web".into()]))
            .await
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].title.as_deref(), Some("Alpha"));
        assert_eq!(both[0].tags, vec!["rust", "web"]);
        assert_eq!(both[0].metadata["title"], "Alpha");

        let other = idx.get_files(&FileQuery::folder("user-bob")).await.unwrap();
        assert!(other.is_empty());
        idx.shutdown().await;
    }

    #[tokio::test]
    async fn test_reindex_is_incremental() {
        let tmp = TempDir::new().unwrap();
        let idx = open(&tmp).await;
        let ws = tmp.path().join("workspaces/user-alice");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("README.md"), "# Workspace").unwrap();
        fs::write(ws.join("old.md"), "# Old").unwrap();

        idx.index_folder(&ws).await.unwrap();
        fs::remove_file(ws.join("old.md")).unwrap();
        fs::write(ws.join("README.md"), "---\ntags: [x]\n---\n# Workspace v2").unwrap();

        let stats = idx.index_folder(&ws).await.unwrap();
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.updated, 1);

        let files = idx.get_files(&FileQuery::folder("user-alice")).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].title.as_deref(), Some("Workspace v2"));
        assert_eq!(files[0].tags, vec!["x"]);

        let again = idx.index_folder(&ws).await.unwrap();
        assert_eq!(again.unchanged, 1);
        assert_eq!(again.updated, 0);
    }
}
