//! Bulk reconciliation of an external redirect list against the store.
//!
//! Each complete row is compared per host against the live record for
//! `(source, host)`:
//!
//! - identical → [`ProtocolEntry::Unchanged`], host dropped from the write set
//! - different → record deleted, [`ProtocolEntry::Deleted`], host kept
//! - missing → host kept
//!
//! The remaining hosts are written with a single
//! [`ChainEngine::add_redirect`] call so chain collapse applies to imported
//! redirects exactly as to hand-added ones.

use chrono::{DateTime, Utc};
use log::{info, warn};
use regex::Regex;
use serde::Serialize;

use crate::chain::{AddRedirect, ChainEngine};
use crate::error::{RedirectError, RowError};
use crate::models::{normalize_path, Redirect, RedirectType};
use crate::rows::{parse_datetime, ImportRow, RowRecord};

/// Default `[validation] source_uri_path` pattern.
pub const DEFAULT_SOURCE_PATTERN: &str = r"^[A-Za-z0-9_\-/.%+~@!$&()*,;=:]+$";

pub const DEFAULT_CREATOR: &str = "imported";

pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 50;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Raw source paths must match this pattern.
    pub source_pattern: Regex,
    /// Creator for rows without one.
    pub default_creator: String,
    /// Store checkpoint every N rows. Zero disables intermediate checkpoints.
    pub checkpoint_interval: usize,
}

impl ImportOptions {
    pub fn new(source_pattern: Regex) -> Self {
        Self {
            source_pattern,
            default_creator: DEFAULT_CREATOR.to_string(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

/// Context of a failed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorArguments {
    pub source_uri_path: String,
    pub target_uri_path: String,
    pub status_code: u16,
    /// JSON list of hosts, or `all hosts`.
    pub hosts: String,
}

/// One line of the import protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolEntry {
    Created { redirect: Redirect },
    Deleted { redirect: Redirect },
    Unchanged { redirect: Redirect },
    Error {
        message: String,
        arguments: Option<ErrorArguments>,
    },
}

impl ProtocolEntry {
    fn row_error(error: RowError) -> Self {
        ProtocolEntry::Error {
            message: error.to_string(),
            arguments: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProtocolEntry::Error { .. })
    }
}

/// A validated row ready for reconciliation.
struct ParsedRow {
    source_uri_path: String,
    target_uri_path: String,
    status_code: u16,
    hosts: Vec<Option<String>>,
    start_date_time: Option<DateTime<Utc>>,
    end_date_time: Option<DateTime<Utc>>,
    comment: Option<String>,
    creator: Option<String>,
    kind: RedirectType,
}

impl ParsedRow {
    fn is_same(&self, existing: &Redirect) -> bool {
        existing.source_uri_path == self.source_uri_path
            && existing.target_uri_path == self.target_uri_path
            && existing.status_code == self.status_code
            && existing.start_date_time == self.start_date_time
            && existing.end_date_time == self.end_date_time
            && existing.comment == self.comment
    }
}

fn hosts_argument(hosts: &[Option<String>]) -> String {
    if hosts.iter().all(Option::is_none) {
        return "all hosts".to_string();
    }
    serde_json::to_string(hosts).unwrap_or_else(|_| "all hosts".to_string())
}

pub struct ImportReconciler<'a> {
    engine: &'a ChainEngine,
    options: ImportOptions,
}

impl<'a> ImportReconciler<'a> {
    pub fn new(engine: &'a ChainEngine, options: ImportOptions) -> Self {
        Self { engine, options }
    }

    fn parse(&self, record: RowRecord) -> Result<ParsedRow, RowError> {
        let status_code = record
            .status_code
            .parse::<u16>()
            .map_err(|_| RowError::InvalidStatusCode {
                value: record.status_code.clone(),
            })?;
        let start_date_time = record
            .start_date_time
            .as_deref()
            .map(|v| parse_datetime("Start", v))
            .transpose()?;
        let end_date_time = record
            .end_date_time
            .as_deref()
            .map(|v| parse_datetime("End", v))
            .transpose()?;
        if !self.options.source_pattern.is_match(&record.source_uri_path) {
            return Err(RowError::InvalidSourcePath {
                path: record.source_uri_path,
            });
        }

        let hosts = record.host_list();
        let kind = record
            .kind
            .as_deref()
            .and_then(|k| k.parse().ok())
            .unwrap_or(RedirectType::Manual);
        Ok(ParsedRow {
            source_uri_path: normalize_path(&record.source_uri_path),
            target_uri_path: record.target_uri_path,
            status_code,
            hosts,
            start_date_time,
            end_date_time,
            comment: record.comment,
            creator: record.creator,
            kind,
        })
    }

    /// Runs the import and returns its protocol.
    ///
    /// Bad rows are recorded and skipped. Lookup, delete and checkpoint
    /// failures abort the import with [`RedirectError::Storage`].
    pub async fn import<I>(&self, rows: I) -> Result<Vec<ProtocolEntry>, RedirectError>
    where
        I: IntoIterator<Item = ImportRow>,
    {
        let store = self.engine.store();
        let mut protocol = Vec::new();

        for (index, row) in rows.into_iter().enumerate() {
            if index > 0
                && self.options.checkpoint_interval > 0
                && index % self.options.checkpoint_interval == 0
            {
                store.checkpoint().await?;
            }

            let record = match row {
                ImportRow::Incomplete { .. } if index == 0 => {
                    warn!("first import row is incomplete; aborting");
                    protocol.push(ProtocolEntry::row_error(RowError::InvalidFormat));
                    break;
                }
                ImportRow::Incomplete { raw } => {
                    warn!("skipping incomplete import row {}", index + 1);
                    protocol.push(ProtocolEntry::row_error(RowError::MissingFields { row: raw }));
                    continue;
                }
                ImportRow::Complete(record) => record,
            };
            if record.is_header() {
                continue;
            }

            let parsed = match self.parse(record) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("skipping import row {}: {}", index + 1, e);
                    protocol.push(ProtocolEntry::row_error(e));
                    continue;
                }
            };

            let mut write_hosts = Vec::new();
            for host in &parsed.hosts {
                let existing = store
                    .find_one(&parsed.source_uri_path, host.as_deref(), false)
                    .await?;
                match existing {
                    Some(redirect) if parsed.is_same(&redirect) => {
                        protocol.push(ProtocolEntry::Unchanged { redirect });
                    }
                    Some(redirect) => {
                        store
                            .delete_one(&redirect.source_uri_path, redirect.host.as_deref())
                            .await?;
                        protocol.push(ProtocolEntry::Deleted { redirect });
                        write_hosts.push(host.clone());
                    }
                    None => write_hosts.push(host.clone()),
                }
            }
            if write_hosts.is_empty() {
                continue;
            }

            let request = AddRedirect {
                source_uri_path: parsed.source_uri_path.clone(),
                target_uri_path: parsed.target_uri_path.clone(),
                status_code: Some(parsed.status_code),
                hosts: write_hosts.clone(),
                creator: Some(
                    parsed
                        .creator
                        .clone()
                        .unwrap_or_else(|| self.options.default_creator.clone()),
                ),
                comment: parsed.comment.clone(),
                kind: Some(parsed.kind),
                start_date_time: parsed.start_date_time,
                end_date_time: parsed.end_date_time,
            };

            match self.engine.add_redirect(request).await {
                Ok(created) => {
                    for redirect in created {
                        info!(
                            "imported redirect {} -> {} ({}) for {}",
                            redirect.source_uri_path,
                            redirect.target_uri_path,
                            redirect.status_code,
                            redirect.host_label()
                        );
                        protocol.push(ProtocolEntry::Created { redirect });
                    }
                }
                Err(e) => {
                    let arguments = ErrorArguments {
                        source_uri_path: parsed.source_uri_path,
                        target_uri_path: parsed.target_uri_path,
                        status_code: parsed.status_code,
                        hosts: hosts_argument(&write_hosts),
                    };
                    warn!(
                        "import of {} -> {} ({}) for {} failed: {}",
                        arguments.source_uri_path,
                        arguments.target_uri_path,
                        arguments.status_code,
                        arguments.hosts,
                        e
                    );
                    protocol.push(ProtocolEntry::Error {
                        message: e.to_string(),
                        arguments: Some(arguments),
                    });
                }
            }
        }

        store.checkpoint().await?;
        Ok(protocol)
    }
}
