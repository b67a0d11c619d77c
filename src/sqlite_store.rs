//! SQLite-backed [`RedirectStore`] implementation.
//!
//! Timestamps are stored as unix seconds. The global scope is a `NULL`
//! host; lookups compare `IFNULL(host, '')` so both scopes share the
//! unique index created by [`migrate`](crate::migrate).
//!
//! [`write_scope`](RedirectStore::write_scope) holds the database write
//! lock from the scope read to the commit, so chain writes from separate
//! processes sharing one file are serialized.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};

use redirect_handler_core::models::{normalize_host, normalize_path};
use redirect_handler_core::store::{
    HostFilter, RedirectFilter, RedirectStore, ScopeChanges, ScopePlanner,
};
use redirect_handler_core::{NewRedirect, Redirect, RedirectType};

use crate::config::Config;
use crate::{db, migrate};

const COLUMNS: &str = "source_uri_path, target_uri_path, status_code, host, creator, comment, \
                       type, start_at, end_at, hit_counter, last_hit, created_at, updated_at";

/// SQLite implementation of the [`RedirectStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the configured database, creating the schema if needed.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await.with_context(|| {
            format!("Failed to open database: {}", config.db.path.display())
        })?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_ts(value: &DateTime<Utc>) -> i64 {
    value.timestamp()
}

fn from_ts(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|ts| DateTime::from_timestamp(ts, 0))
}

fn row_to_redirect(row: &SqliteRow) -> Redirect {
    let status: i64 = row.get("status_code");
    let hits: i64 = row.get("hit_counter");
    let kind: Option<String> = row.get("type");
    Redirect {
        source_uri_path: row.get("source_uri_path"),
        target_uri_path: row.get("target_uri_path"),
        status_code: u16::try_from(status).unwrap_or_default(),
        host: row.get("host"),
        creator: row.get("creator"),
        comment: row.get("comment"),
        kind: RedirectType::from_lossy(kind.as_deref()),
        start_date_time: from_ts(row.get("start_at")),
        end_date_time: from_ts(row.get("end_at")),
        hit_counter: u64::try_from(hits).unwrap_or_default(),
        last_hit: from_ts(row.get("last_hit")),
        creation_date_time: from_ts(row.get("created_at")),
        last_modification_date_time: from_ts(row.get("updated_at")),
    }
}

async fn fetch_scoped(
    conn: &mut SqliteConnection,
    source: &str,
    host: Option<&str>,
) -> Result<Option<Redirect>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM redirects WHERE source_uri_path = ? AND IFNULL(host, '') = ?",
        COLUMNS
    ))
    .bind(source)
    .bind(host.unwrap_or_default())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.as_ref().map(row_to_redirect))
}

async fn insert_row(conn: &mut SqliteConnection, redirect: &NewRedirect) -> Result<Redirect> {
    let source = normalize_path(&redirect.source_uri_path);
    let host = normalize_host(redirect.host.as_deref());
    let now = Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO redirects (source_uri_path, target_uri_path, status_code, host, creator,
                               comment, type, start_at, end_at, hit_counter, last_hit,
                               created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
        "#,
    )
    .bind(&source)
    .bind(&redirect.target_uri_path)
    .bind(i64::from(redirect.status_code))
    .bind(&host)
    .bind(&redirect.creator)
    .bind(&redirect.comment)
    .bind(redirect.kind.as_str())
    .bind(redirect.start_date_time.as_ref().map(to_ts))
    .bind(redirect.end_date_time.as_ref().map(to_ts))
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .with_context(|| {
        format!(
            "Failed to insert redirect \"{}\" for {}",
            source,
            host.as_deref().unwrap_or("all hosts")
        )
    })?;

    fetch_scoped(conn, &source, host.as_deref())
        .await?
        .ok_or_else(|| anyhow!("inserted redirect \"{}\" not found", source))
}

/// Runs one scope batch on an open transaction.
async fn apply_in(conn: &mut SqliteConnection, changes: &ScopeChanges) -> Result<Redirect> {
    let host = normalize_host(changes.host.as_deref()).unwrap_or_default();
    let now = Utc::now().timestamp();

    for source in &changes.deletions {
        sqlx::query("DELETE FROM redirects WHERE source_uri_path = ? AND IFNULL(host, '') = ?")
            .bind(source)
            .bind(&host)
            .execute(&mut *conn)
            .await?;
    }

    for retarget in &changes.retargets {
        let result = sqlx::query(
            "UPDATE redirects SET target_uri_path = ?, updated_at = ? \
             WHERE source_uri_path = ? AND IFNULL(host, '') = ?",
        )
        .bind(&retarget.target_uri_path)
        .bind(now)
        .bind(&retarget.source_uri_path)
        .bind(&host)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            bail!(
                "cannot retarget missing redirect \"{}\"",
                retarget.source_uri_path
            );
        }
    }

    insert_row(conn, &changes.insertion).await
}

#[async_trait]
impl RedirectStore for SqliteStore {
    async fn find_one(
        &self,
        source_uri_path: &str,
        host: Option<&str>,
        fallback: bool,
    ) -> Result<Option<Redirect>> {
        let source = normalize_path(source_uri_path);
        let host = normalize_host(host);
        let mut conn = self.pool.acquire().await?;

        if let Some(redirect) = fetch_scoped(&mut conn, &source, host.as_deref()).await? {
            return Ok(Some(redirect));
        }
        if fallback && host.is_some() {
            return fetch_scoped(&mut conn, &source, None).await;
        }
        Ok(None)
    }

    async fn find_all(&self, filter: &RedirectFilter) -> Result<Vec<Redirect>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM redirects WHERE 1 = 1", COLUMNS));

        match &filter.host {
            HostFilter::Any => {}
            HostFilter::Scope(None) => {
                qb.push(" AND host IS NULL");
            }
            HostFilter::Scope(Some(host)) => {
                qb.push(" AND host = ");
                qb.push_bind(host.clone());
            }
        }
        if let Some(now) = filter.active_at {
            let now = now.timestamp();
            qb.push(" AND (start_at IS NULL OR start_at <= ");
            qb.push_bind(now);
            qb.push(") AND (end_at IS NULL OR end_at >= ");
            qb.push_bind(now);
            qb.push(")");
        }
        if let Some(kind) = filter.kind {
            qb.push(" AND type = ");
            qb.push_bind(kind.as_str());
        }
        qb.push(" ORDER BY id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_redirect).collect())
    }

    async fn distinct_hosts(&self) -> Result<Vec<String>> {
        let hosts: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT host FROM redirects WHERE host IS NOT NULL ORDER BY host",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(hosts)
    }

    async fn delete_one(&self, source_uri_path: &str, host: Option<&str>) -> Result<bool> {
        let host = normalize_host(host);
        let result =
            sqlx::query("DELETE FROM redirects WHERE source_uri_path = ? AND IFNULL(host, '') = ?")
                .bind(normalize_path(source_uri_path))
                .bind(host.unwrap_or_default())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM redirects")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_host(&self, host: Option<&str>) -> Result<u64> {
        let host = normalize_host(host);
        let result = sqlx::query("DELETE FROM redirects WHERE IFNULL(host, '') = ?")
            .bind(host.unwrap_or_default())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, redirect: NewRedirect) -> Result<Redirect> {
        let mut conn = self.pool.acquire().await?;
        insert_row(&mut conn, &redirect).await
    }

    async fn apply_changes(&self, changes: &ScopeChanges) -> Result<Redirect> {
        let mut tx = self.pool.begin().await?;
        let inserted = apply_in(&mut *tx, changes).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn write_scope(&self, host: Option<&str>, plan: ScopePlanner<'_>) -> Result<Redirect> {
        let host = normalize_host(host);
        let mut tx = self.pool.begin().await?;
        // A write first takes the database write lock, so the scope read
        // below cannot go stale before commit.
        sqlx::query("UPDATE redirects SET id = id WHERE 0")
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM redirects WHERE IFNULL(host, '') = ? ORDER BY id",
            COLUMNS
        ))
        .bind(host.as_deref().unwrap_or_default())
        .fetch_all(&mut *tx)
        .await?;
        let existing: Vec<Redirect> = rows.iter().map(row_to_redirect).collect();

        let inserted = apply_in(&mut *tx, &plan(&existing)).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn increment_hit(&self, redirect: &Redirect, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE redirects SET hit_counter = hit_counter + 1, last_hit = ? \
             WHERE source_uri_path = ? AND IFNULL(host, '') = ?",
        )
        .bind(at.timestamp())
        .bind(&redirect.source_uri_path)
        .bind(redirect.host.as_deref().unwrap_or_default())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(PASSIVE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
