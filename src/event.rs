//! Event data model and ingestion.
//!
//! An [`Event`] is one log entry: an opaque mapping of field names to JSON
//! scalars. The pipeline only ever reads two fields — `LineNumber`, a stable
//! integer identity assigned at ingestion, and `TimeCreated`, a parseable
//! timestamp — and never mutates anything. Everything else rides along
//! untouched so correlated output keeps full source fidelity.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Field carrying the event's stable integer identity.
pub const LINE_NUMBER_FIELD: &str = "LineNumber";
/// Field carrying the event's timestamp.
pub const TIME_CREATED_FIELD: &str = "TimeCreated";

/// Errors in the pipeline's inputs. All fatal: a run with bad input is
/// aborted before any provider call is paid for.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a JSON array of event objects: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event #{index} has no {TIME_CREATED_FIELD} field")]
    MissingTimestamp { index: usize },

    #[error("event #{index}: unparsable {TIME_CREATED_FIELD} value {value:?}")]
    BadTimestamp { index: usize, value: String },

    #[error("prompt template error: {0}")]
    Template(#[from] crate::prompt::TemplateError),
}

/// One log entry. A thin wrapper over the raw JSON object so field order and
/// unknown fields survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(pub serde_json::Map<String, Value>);

impl Event {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Coerce the line-identity field to an integer.
    ///
    /// Accepts a JSON number or a numeric string; anything else yields `None`
    /// (callers treat such events as lacking a usable identity, not as
    /// errors).
    pub fn line_number(&self) -> Option<i64> {
        match self.get(LINE_NUMBER_FIELD)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Raw `TimeCreated` text, if present and a string.
    pub fn time_created_raw(&self) -> Option<&str> {
        self.get(TIME_CREATED_FIELD).and_then(Value::as_str)
    }

    /// Compact JSON serialization — the form token costs are charged against.
    pub fn to_compact_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

/// Load a JSON array of events from disk.
pub fn load_events(path: &Path) -> Result<Vec<Event>, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InputError::Malformed {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a timestamp the way exported logs actually write them.
///
/// Tries RFC 3339 first, then the naive formats Windows event exports use.
/// Naive timestamps are taken as UTC. Returns `None` rather than defaulting
/// to "now": a silently-wrong timestamp would corrupt chunk boundaries, so
/// the caller must treat `None` as fatal.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %H:%M:%S",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    // Date-only entries occur in some exports; midnight UTC.
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }

    None
}

/// Parse an event's timestamp, failing with a fatal [`InputError`] that names
/// the offending event and raw value.
pub fn event_timestamp(event: &Event, index: usize) -> Result<DateTime<Utc>, InputError> {
    let raw = event
        .time_created_raw()
        .ok_or(InputError::MissingTimestamp { index })?;
    parse_timestamp(raw).ok_or_else(|| InputError::BadTimestamp {
        index,
        value: raw.to_string(),
    })
}
