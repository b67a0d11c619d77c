use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the schema on an open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS redirects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_uri_path TEXT NOT NULL,
            target_uri_path TEXT NOT NULL,
            status_code INTEGER NOT NULL DEFAULT 301,
            host TEXT,
            creator TEXT,
            comment TEXT,
            type TEXT NOT NULL DEFAULT 'generated',
            start_at INTEGER,
            end_at INTEGER,
            hit_counter INTEGER NOT NULL DEFAULT 0,
            last_hit INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One redirect per source and host scope; NULL host is the global scope.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_redirects_source_host \
         ON redirects(source_uri_path, IFNULL(host, ''))",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_redirects_target ON redirects(target_uri_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_redirects_host ON redirects(host)")
        .execute(pool)
        .await?;

    Ok(())
}
