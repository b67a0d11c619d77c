//! `redirects export`: write redirects as CSV.
//!
//! Column order matches what `redirects import` reads, so an export can be
//! edited and re-imported.

use anyhow::{Context, Result};
use chrono::Utc;
use csv::Writer;
use std::io::{self, Write};
use std::path::Path;

use redirect_handler_core::rows::{export_fields, EXPORT_HEADER};
use redirect_handler_core::store::{HostFilter, RedirectFilter};
use redirect_handler_core::{Redirect, RedirectStore, RedirectType};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Export selection.
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    /// Only this host scope. Without it, every scope is exported.
    pub host: Option<String>,
    pub only_active: bool,
    pub kind: Option<RedirectType>,
    pub include_header: bool,
}

impl ExportArgs {
    fn filter(&self) -> RedirectFilter {
        RedirectFilter {
            host: match &self.host {
                Some(host) => HostFilter::Scope(Some(host.clone())),
                None => HostFilter::Any,
            },
            active_at: self.only_active.then(Utc::now),
            kind: self.kind,
        }
    }
}

/// Writes `redirects` as CSV to `out`.
pub fn write_csv<W: Write>(out: W, redirects: &[Redirect], include_header: bool) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    if include_header {
        writer.write_record(EXPORT_HEADER)?;
    }
    for redirect in redirects {
        writer.write_record(export_fields(redirect))?;
    }
    writer.flush()?;
    Ok(())
}

/// Exports to `output`, or to stdout when `None`.
pub async fn run_export(config: &Config, output: Option<&Path>, args: &ExportArgs) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let redirects = store.find_all(&args.filter()).await?;
    store.close().await;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            write_csv(file, &redirects, args.include_header)?;
            eprintln!(
                "Exported {} redirects to {}",
                redirects.len(),
                path.display()
            );
        }
        None => {
            write_csv(io::stdout().lock(), &redirects, args.include_header)?;
        }
    }

    Ok(())
}
