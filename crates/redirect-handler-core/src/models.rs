//! Core data models used throughout Redirect Handler.
//!
//! A [`Redirect`] is a directed edge `source → target` scoped to a host.
//! Records with the same `host` form an independent graph ("host scope");
//! `host == None` is the global scope that applies to every host without a
//! more specific match.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status code used when a caller does not specify one.
pub const DEFAULT_STATUS_CODE: u16 = 301;

/// Distinguishes system-authored redirects from operator-authored ones.
///
/// Used for filtering only; both kinds go through identical chain rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectType {
    #[default]
    Generated,
    Manual,
}

impl RedirectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectType::Generated => "generated",
            RedirectType::Manual => "manual",
        }
    }

    /// Parses a stored or imported type, falling back to
    /// [`RedirectType::Generated`] for absent or unrecognized values.
    pub fn from_lossy(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for RedirectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedirectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(RedirectType::Generated),
            "manual" => Ok(RedirectType::Manual),
            other => Err(format!(
                "unknown redirect type '{}', expected 'generated' or 'manual'",
                other
            )),
        }
    }
}

/// A stored redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    /// Normalized relative path that triggers the redirect (no leading or trailing `/`).
    pub source_uri_path: String,
    /// Relative path or absolute URI the client is sent to, kept as given.
    pub target_uri_path: String,
    pub status_code: u16,
    /// Host scope; `None` applies to all hosts not otherwise matched.
    pub host: Option<String>,
    pub creator: Option<String>,
    pub comment: Option<String>,
    #[serde(rename = "type")]
    pub kind: RedirectType,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub hit_counter: u64,
    pub last_hit: Option<DateTime<Utc>>,
    pub creation_date_time: Option<DateTime<Utc>>,
    pub last_modification_date_time: Option<DateTime<Utc>>,
}

impl Redirect {
    /// Returns `false` when `now` lies outside the optional activation window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if matches!(self.start_date_time, Some(start) if start > now) {
            return false;
        }
        if matches!(self.end_date_time, Some(end) if end < now) {
            return false;
        }
        true
    }

    /// Human-readable host label used by CLI output and log lines.
    pub fn host_label(&self) -> &str {
        self.host.as_deref().unwrap_or("all hosts")
    }
}

/// A redirect about to be written, before the store assigns timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRedirect {
    pub source_uri_path: String,
    pub target_uri_path: String,
    pub status_code: u16,
    pub host: Option<String>,
    pub creator: Option<String>,
    pub comment: Option<String>,
    pub kind: RedirectType,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
}

impl NewRedirect {
    /// Materializes the record as a store would persist it at `now`.
    pub fn into_redirect(self, now: DateTime<Utc>) -> Redirect {
        Redirect {
            source_uri_path: self.source_uri_path,
            target_uri_path: self.target_uri_path,
            status_code: self.status_code,
            host: self.host,
            creator: self.creator,
            comment: self.comment,
            kind: self.kind,
            start_date_time: self.start_date_time,
            end_date_time: self.end_date_time,
            hit_counter: 0,
            last_hit: None,
            creation_date_time: Some(now),
            last_modification_date_time: Some(now),
        }
    }
}

/// Normalizes a source path: strips every leading and trailing `/`.
///
/// `"/a/b/"`, `"a/b/"` and `"a/b"` all yield `"a/b"`. The same key is used
/// when comparing a target against a source during chain maintenance.
pub fn normalize_path(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

/// Normalizes a host scope: trims whitespace and maps empty to `None`.
pub fn normalize_host(host: Option<&str>) -> Option<String> {
    host.map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}
