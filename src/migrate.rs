use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the index schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL UNIQUE,
            url_path TEXT NOT NULL,
            folder TEXT NOT NULL,
            extension TEXT NOT NULL,
            title TEXT,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            content TEXT NOT NULL,
            hash TEXT NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_tags (
            file_id TEXT NOT NULL,
            tag TEXT NOT NULL,
            UNIQUE(file_id, tag),
            FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_folder ON files(folder)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_file_tags_tag ON file_tags(tag)")
        .execute(pool)
        .await?;

    Ok(())
}
