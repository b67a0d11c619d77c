//! In-memory [`RedirectStore`] implementation for testing and embedding.
//!
//! Keeps redirects in an insertion-ordered `Vec` behind `std::sync::RwLock`.
//! Retargets update records in place, so they keep their position.

use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{normalize_host, normalize_path, NewRedirect, Redirect};

use super::{RedirectFilter, RedirectStore, ScopeChanges, ScopePlanner};

/// In-memory store for tests and embedders.
pub struct InMemoryStore {
    redirects: RwLock<Vec<Redirect>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            redirects: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Redirect>>> {
        self.redirects
            .read()
            .map_err(|_| anyhow!("redirect store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Redirect>>> {
        self.redirects
            .write()
            .map_err(|_| anyhow!("redirect store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn position(redirects: &[Redirect], source: &str, host: Option<&str>) -> Option<usize> {
    redirects
        .iter()
        .position(|r| r.source_uri_path == source && r.host.as_deref() == host)
}

fn push_new(redirects: &mut Vec<Redirect>, redirect: NewRedirect) -> Result<Redirect> {
    let mut redirect = redirect;
    redirect.source_uri_path = normalize_path(&redirect.source_uri_path);
    redirect.host = normalize_host(redirect.host.as_deref());
    if position(
        redirects,
        &redirect.source_uri_path,
        redirect.host.as_deref(),
    )
    .is_some()
    {
        bail!(
            "a redirect for source \"{}\" already exists for {}",
            redirect.source_uri_path,
            redirect.host.as_deref().unwrap_or("all hosts")
        );
    }
    let stored = redirect.into_redirect(Utc::now());
    redirects.push(stored.clone());
    Ok(stored)
}

/// Applies `changes` to `redirects`, leaving them untouched on failure.
fn apply_to(redirects: &mut Vec<Redirect>, changes: &ScopeChanges) -> Result<Redirect> {
    let host = normalize_host(changes.host.as_deref());
    let mut next = redirects.clone();
    next.retain(|r| !(r.host == host && changes.deletions.contains(&r.source_uri_path)));
    let now = Utc::now();
    for retarget in &changes.retargets {
        let i = position(&next, &retarget.source_uri_path, host.as_deref()).ok_or_else(|| {
            anyhow!(
                "cannot retarget missing redirect \"{}\"",
                retarget.source_uri_path
            )
        })?;
        next[i].target_uri_path = retarget.target_uri_path.clone();
        next[i].last_modification_date_time = Some(now);
    }
    let inserted = push_new(&mut next, changes.insertion.clone())?;

    *redirects = next;
    Ok(inserted)
}

#[async_trait]
impl RedirectStore for InMemoryStore {
    async fn find_one(
        &self,
        source_uri_path: &str,
        host: Option<&str>,
        fallback: bool,
    ) -> Result<Option<Redirect>> {
        let source = normalize_path(source_uri_path);
        let host = normalize_host(host);
        let redirects = self.read()?;
        if let Some(i) = position(&redirects, &source, host.as_deref()) {
            return Ok(Some(redirects[i].clone()));
        }
        if fallback && host.is_some() {
            return Ok(position(&redirects, &source, None).map(|i| redirects[i].clone()));
        }
        Ok(None)
    }

    async fn find_all(&self, filter: &RedirectFilter) -> Result<Vec<Redirect>> {
        let redirects = self.read()?;
        Ok(redirects
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn distinct_hosts(&self) -> Result<Vec<String>> {
        let redirects = self.read()?;
        let hosts: BTreeSet<String> = redirects.iter().filter_map(|r| r.host.clone()).collect();
        Ok(hosts.into_iter().collect())
    }

    async fn delete_one(&self, source_uri_path: &str, host: Option<&str>) -> Result<bool> {
        let source = normalize_path(source_uri_path);
        let host = normalize_host(host);
        let mut redirects = self.write()?;
        match position(&redirects, &source, host.as_deref()) {
            Some(i) => {
                redirects.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut redirects = self.write()?;
        let removed = redirects.len() as u64;
        redirects.clear();
        Ok(removed)
    }

    async fn delete_by_host(&self, host: Option<&str>) -> Result<u64> {
        let host = normalize_host(host);
        let mut redirects = self.write()?;
        let before = redirects.len();
        redirects.retain(|r| r.host != host);
        Ok((before - redirects.len()) as u64)
    }

    async fn insert(&self, redirect: NewRedirect) -> Result<Redirect> {
        let mut redirects = self.write()?;
        push_new(&mut redirects, redirect)
    }

    async fn apply_changes(&self, changes: &ScopeChanges) -> Result<Redirect> {
        let mut redirects = self.write()?;
        apply_to(&mut redirects, changes)
    }

    async fn write_scope(&self, host: Option<&str>, plan: ScopePlanner<'_>) -> Result<Redirect> {
        let host = normalize_host(host);
        let mut redirects = self.write()?;
        let existing: Vec<Redirect> = redirects
            .iter()
            .filter(|r| r.host == host)
            .cloned()
            .collect();
        let changes = plan(&existing);
        apply_to(&mut redirects, &changes)
    }

    async fn increment_hit(&self, redirect: &Redirect, at: DateTime<Utc>) -> Result<()> {
        let mut redirects = self.write()?;
        if let Some(i) = position(
            &redirects,
            &redirect.source_uri_path,
            redirect.host.as_deref(),
        ) {
            redirects[i].hit_counter += 1;
            redirects[i].last_hit = Some(at);
        }
        Ok(())
    }

    async fn checkpoint(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RedirectType;
    use crate::store::{HostFilter, Retarget};

    fn new_redirect(source: &str, target: &str, host: Option<&str>) -> NewRedirect {
        NewRedirect {
            source_uri_path: source.to_string(),
            target_uri_path: target.to_string(),
            status_code: 301,
            host: host.map(str::to_string),
            creator: None,
            comment: None,
            kind: RedirectType::Generated,
            start_date_time: None,
            end_date_time: None,
        }
    }

    #[tokio::test]
    async fn test_find_one_falls_back_to_global() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("foo", "bar", None)).await.unwrap();

        let hit = store.find_one("/foo", Some("example.com"), true).await.unwrap();
        assert_eq!(hit.unwrap().target_uri_path, "bar");

        let miss = store.find_one("foo", Some("example.com"), false).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_find_one_prefers_host_scope() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("foo", "global", None)).await.unwrap();
        store
            .insert(new_redirect("foo", "scoped", Some("example.com")))
            .await
            .unwrap();

        let hit = store.find_one("foo", Some("example.com"), true).await.unwrap();
        assert_eq!(hit.unwrap().target_uri_path, "scoped");
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_source() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("foo", "bar", None)).await.unwrap();
        assert!(store.insert(new_redirect("/foo/", "baz", None)).await.is_err());
        // Same source in another scope is fine.
        store
            .insert(new_redirect("foo", "baz", Some("example.com")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_one_is_idempotent() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("foo", "bar", None)).await.unwrap();
        let first = store.find_one("foo", None, true).await.unwrap();
        let second = store.find_one("foo", None, true).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_delete_by_host_and_distinct_hosts() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("a", "b", None)).await.unwrap();
        store.insert(new_redirect("a", "b", Some("one.test"))).await.unwrap();
        store.insert(new_redirect("c", "d", Some("two.test"))).await.unwrap();
        store.insert(new_redirect("e", "f", Some("one.test"))).await.unwrap();

        assert_eq!(
            store.distinct_hosts().await.unwrap(),
            vec!["one.test".to_string(), "two.test".to_string()]
        );
        assert_eq!(store.delete_by_host(Some("one.test")).await.unwrap(), 2);
        assert_eq!(store.delete_by_host(None).await.unwrap(), 1);

        let rest = store.find_all(&RedirectFilter::default()).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].host.as_deref(), Some("two.test"));
    }

    #[tokio::test]
    async fn test_find_all_filters_scope_and_type() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("a", "b", None)).await.unwrap();
        let mut manual = new_redirect("c", "d", Some("one.test"));
        manual.kind = RedirectType::Manual;
        store.insert(manual).await.unwrap();

        let global = store
            .find_all(&RedirectFilter {
                host: HostFilter::Scope(None),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].source_uri_path, "a");

        let manual_only = store
            .find_all(&RedirectFilter {
                kind: Some(RedirectType::Manual),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(manual_only.len(), 1);
        assert_eq!(manual_only[0].source_uri_path, "c");
    }

    #[tokio::test]
    async fn test_apply_changes_is_all_or_nothing() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("a", "b", None)).await.unwrap();

        let bad = ScopeChanges {
            host: None,
            deletions: vec![],
            retargets: vec![Retarget {
                source_uri_path: "missing".into(),
                target_uri_path: "x".into(),
            }],
            insertion: new_redirect("b", "c", None),
        };
        assert!(store.apply_changes(&bad).await.is_err());

        let all = store.find_all(&RedirectFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].target_uri_path, "b");
    }

    #[tokio::test]
    async fn test_write_scope_plans_over_one_scope() {
        let store = InMemoryStore::new();
        store.insert(new_redirect("a", "b", None)).await.unwrap();
        store
            .insert(new_redirect("a", "b", Some("one.test")))
            .await
            .unwrap();

        let planner = |existing: &[Redirect]| {
            assert_eq!(existing.len(), 1);
            assert_eq!(existing[0].host.as_deref(), Some("one.test"));
            ScopeChanges {
                host: Some("one.test".into()),
                deletions: vec![],
                retargets: vec![Retarget {
                    source_uri_path: "a".into(),
                    target_uri_path: "c".into(),
                }],
                insertion: new_redirect("b", "c", Some("one.test")),
            }
        };
        store.write_scope(Some(" one.test "), &planner).await.unwrap();

        let scoped = store
            .find_all(&RedirectFilter::scope(Some("one.test")))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|r| r.target_uri_path == "c"));
        let global = store.find_one("a", None, false).await.unwrap().unwrap();
        assert_eq!(global.target_uri_path, "b");
    }

    #[tokio::test]
    async fn test_increment_hit() {
        let store = InMemoryStore::new();
        let stored = store.insert(new_redirect("a", "b", None)).await.unwrap();
        let at = Utc::now();
        store.increment_hit(&stored, at).await.unwrap();
        store.increment_hit(&stored, at).await.unwrap();

        let after = store.find_one("a", None, false).await.unwrap().unwrap();
        assert_eq!(after.hit_counter, 2);
        assert_eq!(after.last_hit, Some(at));
    }
}
