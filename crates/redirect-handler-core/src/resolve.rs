//! Request-time redirect resolution.
//!
//! [`ResolutionService::resolve`] maps an incoming request URL to an
//! [`Outcome`]. It never fails: a storage outage degrades to
//! [`Outcome::StorageError`], which callers treat as "no redirect".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use url::Url;

use crate::store::RedirectStore;

/// Feature switches for resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Count hits on matched, active redirects.
    pub hit_counter: bool,
    /// Retry the global scope when the request host has no redirect.
    pub host_fallback: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            hit_counter: true,
            host_fallback: true,
        }
    }
}

/// Result of resolving one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoMatch,
    /// Send the client to `location` with `status`.
    RedirectTo { location: Url, status: u16 },
    /// The resource should error with `status` (400–599).
    Terminal { status: u16 },
    /// The store failed; handle the request as if nothing matched.
    StorageError(String),
}

impl Outcome {
    /// Whether the caller should continue with normal request handling.
    pub fn is_fall_through(&self) -> bool {
        matches!(self, Outcome::NoMatch | Outcome::StorageError(_))
    }
}

pub struct ResolutionService {
    store: Arc<dyn RedirectStore>,
    options: ResolveOptions,
}

impl ResolutionService {
    pub fn new(store: Arc<dyn RedirectStore>, options: ResolveOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Resolves `request` (an absolute URL carrying the request host) at `now`.
    pub async fn resolve(&self, request: &Url, now: DateTime<Utc>) -> Outcome {
        let path = request.path();
        let host = request.host_str();

        let redirect = match self
            .store
            .find_one(path, host, self.options.host_fallback)
            .await
        {
            Ok(Some(redirect)) => redirect,
            Ok(None) => return Outcome::NoMatch,
            Err(e) => {
                warn!("redirect lookup for {} failed: {:#}", request, e);
                return Outcome::StorageError(format!("{:#}", e));
            }
        };

        if !redirect.is_active_at(now) {
            debug!(
                "redirect for \"{}\" ({}) is outside its activation window",
                redirect.source_uri_path,
                redirect.host_label()
            );
            return Outcome::NoMatch;
        }

        if self.options.hit_counter {
            if let Err(e) = self.store.increment_hit(&redirect, now).await {
                warn!(
                    "hit counter update for \"{}\" failed: {:#}",
                    redirect.source_uri_path, e
                );
                return Outcome::StorageError(format!("{:#}", e));
            }
        }

        match redirect.status_code {
            400..=599 => Outcome::Terminal {
                status: redirect.status_code,
            },
            status => Outcome::RedirectTo {
                location: absolute_target(request, &redirect.target_uri_path),
                status,
            },
        }
    }
}

/// Resolves `target` against the request URL.
///
/// A target with a scheme is used as-is. Otherwise its path replaces the
/// request path (an empty path becomes `/`), and its query and fragment
/// replace the request's when present; scheme and authority always come
/// from the request.
pub fn absolute_target(request: &Url, target: &str) -> Url {
    if let Ok(url) = Url::parse(target) {
        return url;
    }

    let (rest, fragment) = match target.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (target, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut location = request.clone();
    location.set_path(&format!("/{}", path.trim_start_matches('/')));
    if query.is_some() {
        location.set_query(query);
    }
    if fragment.is_some() {
        location.set_fragment(fragment);
    }
    location
}
