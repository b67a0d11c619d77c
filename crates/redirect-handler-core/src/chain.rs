//! Chain-consistent redirect insertion.
//!
//! Every insert keeps each host scope a partial function on `source` with
//! no redundant hops and no 2-cycles:
//!
//! - **Chain collapse**: every predecessor edge `X → S` of the new edge
//!   `S → T` is retargeted to `X → T`, repeated up the chain until no
//!   predecessor remains (fixed point).
//! - **Cycle elimination**: a predecessor `T → S` is deleted instead of
//!   being retargeted to `T → T`.
//! - **Same-source conflict**: an existing `S → *` in the scope is
//!   replaced (last write wins).
//!
//! Planning is a pure function over one scope's records
//! ([`plan_scope_changes`]); [`ChainEngine`] hands it to
//! [`RedirectStore::write_scope`] while holding that scope's in-process
//! lock. Writers in other processes are serialized by the store.
//!
//! ```text
//! existing {a→b, c→d}   add d→e   ⇒ {a→b, c→e, d→e}
//! existing {a→b, c→b}   add b→d   ⇒ {a→d, b→d, c→d}
//! existing {a→b, c→d}   add d→c   ⇒ {a→b, d→c}
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::RedirectError;
use crate::models::{
    normalize_host, normalize_path, NewRedirect, Redirect, RedirectType, DEFAULT_STATUS_CODE,
};
use crate::store::{RedirectStore, Retarget, ScopeChanges};

/// Observer notified synchronously after each redirect insertion.
///
/// Not called for edges that were retargeted or deleted as a side effect.
pub trait RedirectObserver: Send + Sync {
    fn on_redirect_created(&self, redirect: &Redirect);
}

/// Arguments of one logical redirect, applied to each listed host scope.
#[derive(Debug, Clone, Default)]
pub struct AddRedirect {
    pub source_uri_path: String,
    pub target_uri_path: String,
    /// Defaults to 301.
    pub status_code: Option<u16>,
    /// Empty means the global scope only.
    pub hosts: Vec<Option<String>>,
    pub creator: Option<String>,
    pub comment: Option<String>,
    /// Defaults to [`RedirectType::Generated`].
    pub kind: Option<RedirectType>,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
}

impl AddRedirect {
    pub fn new(source_uri_path: impl Into<String>, target_uri_path: impl Into<String>) -> Self {
        Self {
            source_uri_path: source_uri_path.into(),
            target_uri_path: target_uri_path.into(),
            ..Default::default()
        }
    }

    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(Some(host.into()));
        self
    }

    pub fn hosts(mut self, hosts: Vec<Option<String>>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn kind(mut self, kind: RedirectType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start_date_time = start;
        self.end_date_time = end;
        self
    }

    /// Normalized, de-duplicated host scopes in the order given.
    fn host_scopes(&self) -> Vec<Option<String>> {
        let mut scopes: Vec<Option<String>> = Vec::new();
        for host in &self.hosts {
            let host = normalize_host(host.as_deref());
            if !scopes.contains(&host) {
                scopes.push(host);
            }
        }
        if scopes.is_empty() {
            scopes.push(None);
        }
        scopes
    }

    fn to_new_redirect(&self, source: &str, host: Option<String>) -> NewRedirect {
        NewRedirect {
            source_uri_path: source.to_string(),
            target_uri_path: self.target_uri_path.clone(),
            status_code: self.status_code.unwrap_or(DEFAULT_STATUS_CODE),
            host,
            creator: self.creator.clone(),
            comment: self.comment.clone(),
            kind: self.kind.unwrap_or_default(),
            start_date_time: self.start_date_time,
            end_date_time: self.end_date_time,
        }
    }
}

/// Computes the writes that insert `insertion` into a scope currently
/// holding `existing`.
///
/// `insertion.source_uri_path` must already be normalized.
pub fn plan_scope_changes(existing: &[Redirect], insertion: NewRedirect) -> ScopeChanges {
    let source = insertion.source_uri_path.clone();
    let target_key = normalize_path(&insertion.target_uri_path);

    let mut deletions: Vec<String> = Vec::new();
    let mut retargets: Vec<Retarget> = Vec::new();

    if existing.iter().any(|r| r.source_uri_path == source) {
        debug!("replacing existing redirect for source \"{}\"", source);
        deletions.push(source.clone());
    }

    let mut visited: HashSet<String> = HashSet::from([source.clone()]);
    let mut frontier: VecDeque<String> = VecDeque::from([source.clone()]);

    while let Some(node) = frontier.pop_front() {
        for edge in existing
            .iter()
            .filter(|r| normalize_path(&r.target_uri_path) == node)
        {
            let predecessor = &edge.source_uri_path;
            if *predecessor == source
                || deletions.contains(predecessor)
                || retargets.iter().any(|r| r.source_uri_path == *predecessor)
            {
                continue;
            }
            if *predecessor == target_key {
                debug!(
                    "removing \"{}\" -> \"{}\" to avoid a circular redirect",
                    predecessor, edge.target_uri_path
                );
                deletions.push(predecessor.clone());
                continue;
            }
            debug!(
                "collapsing \"{}\" -> \"{}\" into \"{}\" -> \"{}\"",
                predecessor, edge.target_uri_path, predecessor, insertion.target_uri_path
            );
            retargets.push(Retarget {
                source_uri_path: predecessor.clone(),
                target_uri_path: insertion.target_uri_path.clone(),
            });
            if visited.insert(predecessor.clone()) {
                frontier.push_back(predecessor.clone());
            }
        }
    }

    ScopeChanges {
        host: insertion.host.clone(),
        deletions,
        retargets,
        insertion,
    }
}

type ScopeLock = Arc<tokio::sync::Mutex<()>>;

/// Applies chain-consistent inserts against a [`RedirectStore`].
///
/// Writers on the same host scope are serialized; different scopes proceed
/// in parallel. The per-scope locks only cover this engine; a store shared
/// with other processes must make [`RedirectStore::write_scope`] exclusive
/// itself (the SQLite store takes its write lock before reading). Nothing
/// is cached between calls.
pub struct ChainEngine {
    store: Arc<dyn RedirectStore>,
    observers: Vec<Arc<dyn RedirectObserver>>,
    scope_locks: Mutex<HashMap<Option<String>, ScopeLock>>,
}

impl ChainEngine {
    pub fn new(store: Arc<dyn RedirectStore>) -> Self {
        Self {
            store,
            observers: Vec::new(),
            scope_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RedirectObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn store(&self) -> &Arc<dyn RedirectStore> {
        &self.store
    }

    fn scope_lock(&self, host: &Option<String>) -> ScopeLock {
        let mut locks = self
            .scope_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(host.clone()).or_default().clone()
    }

    /// Inserts one logical redirect into every requested host scope.
    ///
    /// Returns the inserted records in host-list order. Each scope is
    /// written as one atomic batch before the next scope is processed.
    pub async fn add_redirect(&self, request: AddRedirect) -> Result<Vec<Redirect>, RedirectError> {
        let source = normalize_path(&request.source_uri_path);
        if source.is_empty() {
            return Err(RedirectError::EmptySourcePath);
        }
        if normalize_path(&request.target_uri_path) == source {
            return Err(RedirectError::SelfRedirect { path: source });
        }

        let mut created = Vec::new();
        for host in request.host_scopes() {
            let lock = self.scope_lock(&host);
            let _guard = lock.lock().await;

            let insertion = request.to_new_redirect(&source, host.clone());
            let planner = |existing: &[Redirect]| plan_scope_changes(existing, insertion.clone());
            let redirect = self.store.write_scope(host.as_deref(), &planner).await?;

            for observer in &self.observers {
                observer.on_redirect_created(&redirect);
            }
            created.push(redirect);
        }
        Ok(created)
    }

    /// Follow-up for a replaced asset: redirects the previous public URI to
    /// the new one unless they are equal or a redirect already exists.
    pub async fn redirect_replaced_asset(
        &self,
        previous_uri: &str,
        new_uri: &str,
    ) -> Result<Vec<Redirect>, RedirectError> {
        if previous_uri == new_uri {
            return Ok(Vec::new());
        }
        let previous_path = match url::Url::parse(previous_uri) {
            Ok(url) => url.path().to_string(),
            Err(_) => previous_uri.to_string(),
        };
        if self
            .store
            .find_one(&previous_path, None, true)
            .await?
            .is_some()
        {
            return Ok(Vec::new());
        }
        self.add_redirect(AddRedirect::new(previous_path, new_uri).status_code(DEFAULT_STATUS_CODE))
            .await
    }
}
