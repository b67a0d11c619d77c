//! Fixed-shape rows for import and export.
//!
//! Column order (0-indexed), shared by both directions:
//!
//! | # | Column |
//! |---|--------|
//! | 0 | source uri path |
//! | 1 | target uri path |
//! | 2 | status code |
//! | 3 | hosts, `\|`-joined |
//! | 4 | start date time |
//! | 5 | end date time |
//! | 6 | comment |
//! | 7 | creator |
//! | 8 | type |
//!
//! Tokenizing a file into fields is the caller's job; this module only
//! gives the fields their shape.

use chrono::{DateTime, Utc};

use crate::error::RowError;
use crate::models::Redirect;

/// Datetime format of the start/end columns, e.g. `2024-05-01T10:00:00+02:00`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Header line written by export and skipped by import.
pub const EXPORT_HEADER: [&str; 9] = [
    "Source Uri",
    "Target Uri",
    "Status Code",
    "Host",
    "Start DateTime",
    "End DateTime",
    "Comment",
    "Creator",
    "Type",
];

/// Source, target and status code are always required.
pub const REQUIRED_FIELDS: usize = 3;

/// One tokenized import line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRow {
    /// Fewer than [`REQUIRED_FIELDS`] columns.
    Incomplete { raw: String },
    Complete(RowRecord),
}

/// The columns of a complete import line. Empty optional columns are `None`;
/// the required columns are kept even when blank, so an empty target (used
/// by 4xx redirects) survives and an empty source fails validation per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRecord {
    pub source_uri_path: String,
    pub target_uri_path: String,
    /// Raw status column; validated by the reconciler.
    pub status_code: String,
    pub hosts: Option<String>,
    pub start_date_time: Option<String>,
    pub end_date_time: Option<String>,
    pub comment: Option<String>,
    pub creator: Option<String>,
    pub kind: Option<String>,
}

impl ImportRow {
    /// Shapes positional fields into a row. Missing trailing columns are
    /// treated as empty.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        if fields.len() < REQUIRED_FIELDS {
            let raw: Vec<&str> = fields.iter().map(|f| f.as_ref()).collect();
            return ImportRow::Incomplete { raw: raw.join(",") };
        }

        let required = |i: usize| fields[i].as_ref().trim().to_string();
        let field = |i: usize| -> Option<String> {
            fields
                .get(i)
                .map(|f| f.as_ref().trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string)
        };

        ImportRow::Complete(RowRecord {
            source_uri_path: required(0),
            target_uri_path: required(1),
            status_code: required(2),
            hosts: field(3),
            start_date_time: field(4),
            end_date_time: field(5),
            comment: field(6),
            creator: field(7),
            kind: field(8),
        })
    }
}

impl RowRecord {
    pub fn is_header(&self) -> bool {
        self.source_uri_path == EXPORT_HEADER[0] && self.target_uri_path == EXPORT_HEADER[1]
    }

    /// Expands the hosts column. An absent or blank column means the
    /// global scope only.
    pub fn host_list(&self) -> Vec<Option<String>> {
        let hosts: Vec<Option<String>> = self
            .hosts
            .as_deref()
            .unwrap_or_default()
            .split('|')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| Some(h.to_string()))
            .collect();
        if hosts.is_empty() {
            vec![None]
        } else {
            hosts
        }
    }
}

/// Parses a start/end column. `field` names the column in the error.
pub fn parse_datetime(field: &'static str, value: &str) -> Result<DateTime<Utc>, RowError> {
    DateTime::parse_from_str(value, DATETIME_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RowError::InvalidDateTime {
            field,
            value: value.to_string(),
            format: DATETIME_FORMAT,
        })
}

pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Renders a redirect in export column order.
pub fn export_fields(redirect: &Redirect) -> [String; 9] {
    [
        redirect.source_uri_path.clone(),
        redirect.target_uri_path.clone(),
        redirect.status_code.to_string(),
        redirect.host.clone().unwrap_or_default(),
        redirect
            .start_date_time
            .as_ref()
            .map(format_datetime)
            .unwrap_or_default(),
        redirect
            .end_date_time
            .as_ref()
            .map(format_datetime)
            .unwrap_or_default(),
        redirect.comment.clone().unwrap_or_default(),
        redirect.creator.clone().unwrap_or_default(),
        redirect.kind.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRedirect, RedirectType};
    use chrono::TimeZone;

    #[test]
    fn test_from_fields_requires_three_columns() {
        assert_eq!(
            ImportRow::from_fields(&["a;b;301"]),
            ImportRow::Incomplete {
                raw: "a;b;301".into()
            }
        );
        assert!(matches!(
            ImportRow::from_fields(&["a", "b"]),
            ImportRow::Incomplete { .. }
        ));
        assert!(matches!(
            ImportRow::from_fields(&["a", "b", "301"]),
            ImportRow::Complete(_)
        ));
    }

    #[test]
    fn test_from_fields_keeps_blank_required_columns() {
        let ImportRow::Complete(record) = ImportRow::from_fields(&["gone", "", "410"]) else {
            panic!("three columns make a complete row");
        };
        assert_eq!(record.source_uri_path, "gone");
        assert_eq!(record.target_uri_path, "");
        assert_eq!(record.status_code, "410");

        let ImportRow::Complete(record) = ImportRow::from_fields(&[" ", "b", "301"]) else {
            panic!("three columns make a complete row");
        };
        assert_eq!(record.source_uri_path, "");
    }

    #[test]
    fn test_from_fields_maps_optional_columns() {
        let row = ImportRow::from_fields(&[
            "/a", "b", "302", "one.test|two.test", "", "", "note", "", "manual",
        ]);
        let ImportRow::Complete(record) = row else {
            panic!("expected a complete row");
        };
        assert_eq!(record.hosts.as_deref(), Some("one.test|two.test"));
        assert_eq!(record.start_date_time, None);
        assert_eq!(record.comment.as_deref(), Some("note"));
        assert_eq!(record.creator, None);
        assert_eq!(record.kind.as_deref(), Some("manual"));
    }

    #[test]
    fn test_header_detection() {
        let ImportRow::Complete(header) = ImportRow::from_fields(&EXPORT_HEADER) else {
            panic!("header should be complete");
        };
        assert!(header.is_header());
    }

    #[test]
    fn test_host_list() {
        let record = RowRecord {
            hosts: Some(" one.test | |two.test".into()),
            ..Default::default()
        };
        assert_eq!(
            record.host_list(),
            vec![Some("one.test".to_string()), Some("two.test".to_string())]
        );
        assert_eq!(RowRecord::default().host_list(), vec![None]);
    }

    #[test]
    fn test_parse_datetime() {
        let parsed = parse_datetime("Start", "2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());

        let err = parse_datetime("End", "01.05.2024").unwrap_err();
        assert_eq!(
            err.to_string(),
            "End date time \"01.05.2024\" does not match the format \"%Y-%m-%dT%H:%M:%S%:z\""
        );
    }

    #[test]
    fn test_export_fields_order() {
        let redirect = NewRedirect {
            source_uri_path: "a".into(),
            target_uri_path: "b".into(),
            status_code: 307,
            host: Some("one.test".into()),
            creator: Some("ops".into()),
            comment: None,
            kind: RedirectType::Manual,
            start_date_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()),
            end_date_time: None,
        }
        .into_redirect(Utc::now());

        assert_eq!(
            export_fields(&redirect),
            [
                "a",
                "b",
                "307",
                "one.test",
                "2024-05-01T08:00:00+00:00",
                "",
                "",
                "ops",
                "manual",
            ]
            .map(String::from)
        );
    }
}
