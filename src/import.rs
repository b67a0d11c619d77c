//! `redirects import`: reconcile a CSV file against the store.
//!
//! Parsing uses the `csv` crate with a configurable delimiter and no
//! header handling; rows of any width are passed on and the reconciler
//! decides what is a header or an incomplete line.

use anyhow::{bail, Context, Result};
use log::info;
use std::path::Path;

use redirect_handler_core::import::ProtocolEntry;
use redirect_handler_core::rows::ImportRow;
use redirect_handler_core::ImportReconciler;

use crate::add::{format_redirect_line, print_legend};
use crate::config::Config;

/// Parses a `--delimiter` value: one ASCII character, or `\t` for tab.
pub fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        v if v.len() == 1 && v.is_ascii() => Ok(v.as_bytes()[0]),
        other => bail!(
            "Invalid delimiter '{}': must be a single ASCII character",
            other
        ),
    }
}

/// Reads every line of a CSV file into import rows.
pub fn read_rows(path: &Path, delimiter: u8) -> Result<Vec<ImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Failed to read {} line {}", path.display(), line + 1))?;
        let fields: Vec<&str> = record.iter().collect();
        rows.push(ImportRow::from_fields(fields.as_slice()));
    }
    Ok(rows)
}

/// Renders a protocol entry as output lines.
pub fn format_protocol_entry(entry: &ProtocolEntry) -> Vec<String> {
    match entry {
        ProtocolEntry::Created { redirect } => vec![format_redirect_line("++", redirect)],
        ProtocolEntry::Deleted { redirect } => vec![format_redirect_line("--", redirect)],
        ProtocolEntry::Unchanged { redirect } => vec![format_redirect_line("~~", redirect)],
        ProtocolEntry::Error {
            message,
            arguments: Some(args),
        } => vec![
            format!(
                "   !! {} => {} ({}) - {}",
                args.source_uri_path, args.target_uri_path, args.status_code, args.hosts
            ),
            format!("      Message: {}", message),
        ],
        ProtocolEntry::Error {
            message,
            arguments: None,
        } => vec![format!("   !! {}", message)],
    }
}

/// Runs the import. Returns `false` if the file is unreadable or any row
/// produced an error.
pub async fn run_import(config: &Config, path: &Path, delimiter: u8) -> Result<bool> {
    println!();
    if !path.is_file() {
        println!(
            "Sorry, but the file \"{}\" is not readable or does not exist...",
            path.display()
        );
        println!();
        return Ok(false);
    }
    println!("Import redirects from \"{}\"", path.display());
    println!();

    let rows = read_rows(path, delimiter)?;
    let options = config.import_options()?;
    let (store, engine) = crate::open_engine(config).await?;

    let protocol = ImportReconciler::new(&engine, options).import(rows).await?;
    store.close().await;

    let mut created = 0;
    let mut deleted = 0;
    let mut unchanged = 0;
    let mut errors = 0;
    for entry in &protocol {
        match entry {
            ProtocolEntry::Created { .. } => created += 1,
            ProtocolEntry::Deleted { .. } => deleted += 1,
            ProtocolEntry::Unchanged { .. } => unchanged += 1,
            ProtocolEntry::Error { .. } => errors += 1,
        }
        for line in format_protocol_entry(entry) {
            println!("{}", line);
        }
    }
    info!(
        "import of {} finished: {} created, {} deleted, {} unchanged, {} errors",
        path.display(),
        created,
        deleted,
        unchanged,
        errors
    );

    println!();
    if errors > 0 {
        println!("   !! some errors appeared during import, please check the log or the CLI output.");
    }
    print_legend();

    Ok(errors == 0)
}
