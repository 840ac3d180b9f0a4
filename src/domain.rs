use std::cmp::Ordering;
use std::fmt;

use camino::Utf8PathBuf;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One downloadable dataset as advertised by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub id: String,
    pub title: String,
    pub theme_tags: Vec<String>,
    pub last_modified: String,
    pub download_url: Option<String>,
}

impl DatasetDescriptor {
    pub fn matches_theme(&self, theme: &str) -> bool {
        let needle = theme.to_lowercase();
        self.theme_tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
    }
}

/// Compares two version markers.
///
/// Markers that both parse as dates or timestamps are compared
/// chronologically; anything else falls back to plain string ordering, which
/// is what the catalog's ISO-8601 markers sort correctly under anyway.
pub fn compare_markers(left: &str, right: &str) -> Ordering {
    match (parse_marker(left), parse_marker(right)) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => left.cmp(right),
    }
}

fn parse_marker(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Why a single dataset could not be synchronized. Never fatal to a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    NoUrl,
    FetchError(String),
    ParseError(String),
    WriteError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoUrl => write!(f, "no download URL"),
            FailureReason::FetchError(detail) => write!(f, "fetch failed: {detail}"),
            FailureReason::ParseError(detail) => write!(f, "parse failed: {detail}"),
            FailureReason::WriteError(detail) => write!(f, "write failed: {detail}"),
        }
    }
}

/// The single result a worker produces for one descriptor in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Skipped {
        dataset_id: String,
        title: String,
    },
    Succeeded {
        dataset_id: String,
        title: String,
        new_marker: String,
        path: Utf8PathBuf,
    },
    Failed {
        dataset_id: String,
        title: String,
        reason: FailureReason,
    },
}

impl FetchOutcome {
    pub fn dataset_id(&self) -> &str {
        match self {
            FetchOutcome::Skipped { dataset_id, .. }
            | FetchOutcome::Succeeded { dataset_id, .. }
            | FetchOutcome::Failed { dataset_id, .. } => dataset_id,
        }
    }
}

/// What a worker would do with a descriptor, before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    MissingUrl,
    UpToDate { marker: String },
    Stale { url: String, previous: Option<String> },
}
