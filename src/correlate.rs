//! Correlation of flagged line numbers back to full event records.

use std::collections::HashSet;

use crate::consolidate::ConsolidatedResult;
use crate::event::{self, Event};

/// Ordering for correlated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Keep the source log's original order.
    #[default]
    Source,
    /// Stable sort by the TimeCreated field; events with an unparseable or
    /// missing timestamp sort first, in source order.
    TimeCreated,
}

/// Options for [`correlate_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelateOptions {
    pub sort: SortOrder,
}

/// Select the full events whose line numbers were flagged, preserving the
/// source log's order. Each event appears at most once regardless of how
/// many times its line number was flagged.
pub fn correlate(events: &[Event], result: &ConsolidatedResult) -> Vec<Event> {
    correlate_with(events, result, CorrelateOptions::default())
}

/// [`correlate`] with explicit options.
pub fn correlate_with(
    events: &[Event],
    result: &ConsolidatedResult,
    options: CorrelateOptions,
) -> Vec<Event> {
    let flagged: HashSet<i64> = result
        .consolidated_flagged_records
        .iter()
        .map(|r| r.line_number)
        .collect();

    // Events without a coercible line number cannot match and are skipped.
    let mut matched: Vec<Event> = events
        .iter()
        .filter(|e| e.line_number().map_or(false, |n| flagged.contains(&n)))
        .cloned()
        .collect();

    eprintln!(
        "[correlate] {} flagged line number(s), {} event(s) matched",
        flagged.len(),
        matched.len()
    );

    if options.sort == SortOrder::TimeCreated {
        matched.sort_by_key(|e| {
            e.time_created_raw()
                .and_then(event::parse_timestamp)
        });
    }

    matched
}
