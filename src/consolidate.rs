//! Consolidation of flagged records out of free-form pass output.
//!
//! First-pass replies are markdown prose with embedded JSON objects of the
//! shape `{"LineNumber": N, "Summary": "...", "Reason": "..."}`. The model
//! rarely emits clean JSON documents, so extraction is a tolerant regex scan
//! over the raw text rather than a parse: anything matching the record shape
//! is collected, everything else is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// (?s) so summaries and reasons may span lines. The string bodies permit any
// escaped character or any character other than a bare quote or backslash,
// which keeps the scan from running past a record's closing quote.
static FLAGGED_RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)\{\s*"LineNumber"\s*:\s*(?P<line>\d+)\s*,\s*"Summary"\s*:\s*"(?P<summary>(?:\\.|[^"\\])*)"\s*,\s*"[Rr]eason"\s*:\s*"(?P<reason>(?:\\.|[^"\\])*)"\s*\}"#,
    )
    .expect("invalid flagged record regex")
});

/// One document of pass output to scan.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Identifier carried onto extracted records, e.g. a file name.
    pub id: String,
    /// The raw markdown text.
    pub text: String,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A record the model flagged for follow-up.
///
/// String fields are kept exactly as matched, escape sequences included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedRecord {
    #[serde(rename = "LineNumber")]
    pub line_number: i64,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Reason")]
    pub reason: String,
    /// Which source document the record came from.
    pub source: String,
}

/// All flagged records across the scanned documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    pub consolidated_flagged_records: Vec<FlaggedRecord>,
    pub total_flagged: usize,
}

impl ConsolidatedResult {
    /// Unique line numbers across all records, in first-seen order.
    pub fn line_numbers(&self) -> Vec<i64> {
        let mut seen = std::collections::HashSet::new();
        self.consolidated_flagged_records
            .iter()
            .filter(|r| seen.insert(r.line_number))
            .map(|r| r.line_number)
            .collect()
    }
}

/// Scan one document for flagged records.
///
/// Records appear in match order. A record whose line number fails to parse
/// is skipped. Duplicates are kept.
pub fn extract_flagged(text: &str, source: &str) -> Vec<FlaggedRecord> {
    FLAGGED_RECORD
        .captures_iter(text)
        .filter_map(|caps| {
            let line_number = caps.name("line")?.as_str().parse().ok()?;
            Some(FlaggedRecord {
                line_number,
                summary: caps.name("summary")?.as_str().to_string(),
                reason: caps.name("reason")?.as_str().to_string(),
                source: source.to_string(),
            })
        })
        .collect()
}

/// Consolidate flagged records across documents, in document order then
/// match order within each document.
pub fn consolidate(documents: &[SourceDocument]) -> ConsolidatedResult {
    let mut records = Vec::new();
    for doc in documents {
        let found = extract_flagged(&doc.text, &doc.id);
        eprintln!("[consolidate] {}: {} flagged record(s)", doc.id, found.len());
        records.extend(found);
    }

    let total_flagged = records.len();
    eprintln!("[consolidate] total flagged: {total_flagged}");

    ConsolidatedResult {
        consolidated_flagged_records: records,
        total_flagged,
    }
}
