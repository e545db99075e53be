//! Segmenter: split an ordered event stream into bounded chunks.
//!
//! Greedy single pass, O(n) in events. A chunk closes when the next event
//! would push it over the token budget OR arrives after too long a quiet
//! period — either condition alone forces a boundary. Chunks partition the
//! input exactly: concatenating them in order reproduces the event sequence
//! with no drops or duplicates.

use chrono::{DateTime, Duration, Utc};

use crate::event::{event_timestamp, Event, InputError};
use crate::tokens::TokenCounter;

/// Segmentation limits.
#[derive(Debug, Clone, Copy)]
pub struct SegmentParams {
    /// Maximum serialized token cost per chunk.
    pub token_budget: usize,
    /// Maximum gap between adjacent events within one chunk.
    pub time_gap_limit: Duration,
}

impl Default for SegmentParams {
    fn default() -> Self {
        // 50k tokens / 1h gap, the limits the log triage runs settled on.
        Self {
            token_budget: 50_000,
            time_gap_limit: Duration::hours(1),
        }
    }
}

/// An ordered, non-empty run of events sent as one unit to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    events: Vec<Event>,
    tokens: usize,
}

impl Chunk {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total token cost of the chunk's events. May exceed the budget only
    /// for a single-event chunk.
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    /// Pretty JSON array of the chunk's events — the form substituted into
    /// prompts and written to part files.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.events).unwrap_or_else(|_| "[]".into())
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

/// Partition `events` into chunks respecting `params`.
///
/// An empty running chunk always accepts the next event regardless of cost,
/// so an event whose own cost exceeds the budget still forms its own chunk —
/// it is an unsplittable minimum unit, never dropped or truncated. An
/// unparsable or missing `TimeCreated` is a fatal [`InputError`]; defaulting
/// it to "no gap" would silently corrupt boundaries.
pub fn segment(
    events: &[Event],
    counter: &TokenCounter,
    params: &SegmentParams,
) -> Result<Vec<Chunk>, InputError> {
    let mut chunks = Vec::new();
    let mut current: Vec<Event> = Vec::new();
    let mut current_tokens = 0usize;
    let mut last_time: Option<DateTime<Utc>> = None;

    for (index, event) in events.iter().enumerate() {
        let time = event_timestamp(event, index)?;
        let cost = counter.count_event(event);

        if !current.is_empty() {
            let over_budget = current_tokens + cost > params.token_budget;
            let over_gap = match last_time {
                Some(prev) => time - prev > params.time_gap_limit,
                None => false,
            };
            if over_budget || over_gap {
                chunks.push(Chunk {
                    events: std::mem::take(&mut current),
                    tokens: current_tokens,
                });
                current_tokens = 0;
            }
        }

        current.push(event.clone());
        current_tokens += cost;
        last_time = Some(time);
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            events: current,
            tokens: current_tokens,
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(line: i64, time: &str) -> Event {
        serde_json::from_value(json!({
            "LineNumber": line,
            "TimeCreated": time,
        }))
        .unwrap()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunks = segment(&[], &TokenCounter::default(), &SegmentParams::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn unparsable_timestamp_is_fatal() {
        let events = vec![event(1, "2024-03-01T00:00:00Z"), event(2, "not a time")];
        let err = segment(&events, &TokenCounter::default(), &SegmentParams::default())
            .unwrap_err();
        assert!(matches!(err, InputError::BadTimestamp { index: 1, .. }));
    }

    #[test]
    fn single_chunk_within_limits() {
        let events = vec![
            event(1, "2024-03-01T00:00:00Z"),
            event(2, "2024-03-01T00:10:00Z"),
        ];
        let chunks =
            segment(&events, &TokenCounter::default(), &SegmentParams::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 2);
    }

    #[test]
    fn time_gap_forces_boundary() {
        let params = SegmentParams {
            token_budget: 1_000_000,
            time_gap_limit: Duration::hours(1),
        };
        let events = vec![
            event(1, "2024-03-01T00:00:00Z"),
            event(2, "2024-03-01T00:30:00Z"),
            event(3, "2024-03-01T02:00:00Z"), // 90min after #2
        ];
        let chunks = segment(&events, &TokenCounter::default(), &params).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn gap_exactly_at_limit_does_not_split() {
        let params = SegmentParams {
            token_budget: 1_000_000,
            time_gap_limit: Duration::hours(1),
        };
        let events = vec![
            event(1, "2024-03-01T00:00:00Z"),
            event(2, "2024-03-01T01:00:00Z"),
        ];
        let chunks = segment(&events, &TokenCounter::default(), &params).unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
