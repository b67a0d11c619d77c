//! Storage abstraction for Redirect Handler.
//!
//! The [`RedirectStore`] trait defines every storage operation needed by
//! the chain engine, the resolution service and the import reconciler,
//! enabling pluggable backends (SQLite, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes and
//! must normalize source paths and hosts with
//! [`normalize_path`](crate::models::normalize_path) and
//! [`normalize_host`](crate::models::normalize_host) before matching.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{NewRedirect, Redirect, RedirectType};

/// Host selection for [`RedirectStore::find_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostFilter {
    /// Every host scope, including the global one.
    #[default]
    Any,
    /// Exactly one host scope; `Scope(None)` selects only global redirects.
    Scope(Option<String>),
}

/// Listing criteria for [`RedirectStore::find_all`].
#[derive(Debug, Clone, Default)]
pub struct RedirectFilter {
    pub host: HostFilter,
    /// When set, only redirects whose activation window contains this instant.
    pub active_at: Option<DateTime<Utc>>,
    pub kind: Option<RedirectType>,
}

impl RedirectFilter {
    /// All redirects of a single host scope.
    pub fn scope(host: Option<&str>) -> Self {
        Self {
            host: HostFilter::Scope(host.map(str::to_string)),
            ..Default::default()
        }
    }

    /// Returns `true` if `redirect` satisfies every criterion.
    pub fn matches(&self, redirect: &Redirect) -> bool {
        if let HostFilter::Scope(host) = &self.host {
            if redirect.host.as_deref() != host.as_deref() {
                return false;
            }
        }
        if let Some(now) = self.active_at {
            if !redirect.is_active_at(now) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if redirect.kind != kind {
                return false;
            }
        }
        true
    }
}

/// A predecessor edge whose target is rewritten during chain collapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retarget {
    pub source_uri_path: String,
    pub target_uri_path: String,
}

/// Every write needed to insert one redirect into one host scope.
///
/// Stores apply a `ScopeChanges` as one atomic unit: deletions first,
/// then retargets, then the insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChanges {
    pub host: Option<String>,
    /// Source paths of edges to remove from the scope.
    pub deletions: Vec<String>,
    pub retargets: Vec<Retarget>,
    pub insertion: NewRedirect,
}

/// Computes a scope batch from the scope's current records.
pub type ScopePlanner<'a> = &'a (dyn Fn(&[Redirect]) -> ScopeChanges + Send + Sync);

/// Abstract storage backend for redirects.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_one`](RedirectStore::find_one) | Lookup by source path and host, optionally falling back to global |
/// | [`find_all`](RedirectStore::find_all) | List in insertion order, filtered |
/// | [`distinct_hosts`](RedirectStore::distinct_hosts) | All non-global host scopes |
/// | [`delete_one`](RedirectStore::delete_one) | Remove one redirect |
/// | [`delete_all`](RedirectStore::delete_all) | Remove everything |
/// | [`delete_by_host`](RedirectStore::delete_by_host) | Remove one host scope |
/// | [`insert`](RedirectStore::insert) | Insert a single record |
/// | [`apply_changes`](RedirectStore::apply_changes) | Atomic scope batch from the chain engine |
/// | [`write_scope`](RedirectStore::write_scope) | Read, plan and apply one scope under the write lock |
/// | [`increment_hit`](RedirectStore::increment_hit) | Hit accounting |
/// | [`checkpoint`](RedirectStore::checkpoint) | Flush hint for bulk operations |
#[async_trait]
pub trait RedirectStore: Send + Sync {
    /// Looks up the redirect for `source_uri_path` in the `host` scope.
    ///
    /// With `fallback`, a miss in a named host scope retries the global scope.
    async fn find_one(
        &self,
        source_uri_path: &str,
        host: Option<&str>,
        fallback: bool,
    ) -> Result<Option<Redirect>>;

    /// Lists redirects matching `filter`, ordered by insertion.
    async fn find_all(&self, filter: &RedirectFilter) -> Result<Vec<Redirect>>;

    /// Returns the sorted set of named hosts that have at least one redirect.
    async fn distinct_hosts(&self) -> Result<Vec<String>>;

    /// Removes one redirect. Returns `true` if it existed.
    async fn delete_one(&self, source_uri_path: &str, host: Option<&str>) -> Result<bool>;

    /// Removes all redirects. Returns the number removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Removes every redirect of one host scope. Returns the number removed.
    async fn delete_by_host(&self, host: Option<&str>) -> Result<u64>;

    /// Inserts a record without chain maintenance, assigning timestamps.
    ///
    /// Fails if a redirect with the same source already exists in the scope.
    async fn insert(&self, redirect: NewRedirect) -> Result<Redirect>;

    /// Applies a scope batch atomically and returns the inserted record.
    async fn apply_changes(&self, changes: &ScopeChanges) -> Result<Redirect>;

    /// Reads the `host` scope, lets `plan` compute a batch from it and
    /// applies the batch atomically. Returns the inserted record.
    ///
    /// The default reads and writes in separate calls, so concurrent
    /// writers must be serialized by the caller. Stores shared between
    /// processes override it to hold their write lock across the read.
    async fn write_scope(&self, host: Option<&str>, plan: ScopePlanner<'_>) -> Result<Redirect> {
        let existing = self.find_all(&RedirectFilter::scope(host)).await?;
        self.apply_changes(&plan(&existing)).await
    }

    /// Increments the hit counter of `redirect` and sets its last hit to `at`.
    async fn increment_hit(&self, redirect: &Redirect, at: DateTime<Utc>) -> Result<()>;

    /// Flush/commit hint used every N rows by bulk imports.
    async fn checkpoint(&self) -> Result<()>;
}
