//! Error types for redirect writes and import rows.
//!
//! Storage failures during resolution are not errors at all: they surface
//! as [`Outcome::StorageError`](crate::resolve::Outcome::StorageError) and
//! callers fall through to normal request handling.

use thiserror::Error;

/// Failure of a write through [`ChainEngine`](crate::chain::ChainEngine).
#[derive(Debug, Error)]
pub enum RedirectError {
    /// The source path was empty after stripping slashes.
    #[error("source path must not be empty")]
    EmptySourcePath,

    /// Source and target normalize to the same path.
    #[error("redirect from \"{path}\" to itself is not allowed")]
    SelfRedirect { path: String },

    /// The backing store failed; the write must not be silently dropped.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A malformed import row. Recorded in the import protocol; never aborts
/// the import except for [`RowError::InvalidFormat`] on the first row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("Invalid csv format, did you set the correct delimiter?")]
    InvalidFormat,

    #[error("Row skipped as it has not all required fields set: {row}")]
    MissingFields { row: String },

    #[error("Status code \"{value}\" is not a number")]
    InvalidStatusCode { value: String },

    #[error("{field} date time \"{value}\" does not match the format \"{format}\"")]
    InvalidDateTime {
        field: &'static str,
        value: String,
        format: &'static str,
    },

    #[error("Source path \"{path}\" does not have a valid format")]
    InvalidSourcePath { path: String },
}
