use std::collections::HashSet;

use logsift::consolidate::{consolidate, SourceDocument};
use logsift::correlate::{correlate, correlate_with, CorrelateOptions, SortOrder};
use logsift::event::Event;
use serde_json::json;

fn events(lines: &[i64]) -> Vec<Event> {
    lines
        .iter()
        .map(|n| {
            serde_json::from_value(json!({
                "LineNumber": n,
                "TimeCreated": "2024-03-01T08:00:00Z",
                "EventID": 4624,
            }))
            .unwrap()
        })
        .collect()
}

fn flagged_doc(lines: &[i64]) -> SourceDocument {
    let text: String = lines
        .iter()
        .map(|n| format!("{{\"LineNumber\": {n}, \"Summary\": \"s\", \"Reason\": \"r\"}}\n"))
        .collect();
    SourceDocument::new("pass1.md", text)
}

#[test]
fn output_is_a_subset_keyed_by_flagged_lines() {
    let all = events(&[3, 1, 4, 1, 5, 9, 2, 6]);
    let result = consolidate(&[flagged_doc(&[9, 4, 9, 77])]);

    let out = correlate(&all, &result);
    let keys: HashSet<i64> = result
        .consolidated_flagged_records
        .iter()
        .map(|r| r.line_number)
        .collect();

    for ev in &out {
        assert!(all.contains(ev));
        assert!(keys.contains(&ev.line_number().unwrap()));
    }
    // Flagged line 77 has no source event and is silently dropped.
    let lines: Vec<i64> = out.iter().map(|e| e.line_number().unwrap()).collect();
    assert_eq!(lines, vec![4, 9]);
}

#[test]
fn correlated_events_are_the_originals_not_reconstructions() {
    let all = events(&[10]);
    let result = consolidate(&[flagged_doc(&[10])]);

    let out = correlate(&all, &result);
    assert_eq!(out, all);
    assert_eq!(
        out[0].get("EventID").and_then(|v| v.as_i64()),
        Some(4624)
    );
}

#[test]
fn explicit_time_sort_reorders_only_when_asked() {
    let all: Vec<Event> = vec![
        serde_json::from_value(
            json!({ "LineNumber": 1, "TimeCreated": "2024-03-02T00:00:00Z" }),
        )
        .unwrap(),
        serde_json::from_value(
            json!({ "LineNumber": 2, "TimeCreated": "2024-03-01T00:00:00Z" }),
        )
        .unwrap(),
    ];
    let result = consolidate(&[flagged_doc(&[1, 2])]);

    let source_order = correlate(&all, &result);
    let lines: Vec<i64> = source_order.iter().map(|e| e.line_number().unwrap()).collect();
    assert_eq!(lines, vec![1, 2]);

    let time_order = correlate_with(
        &all,
        &result,
        CorrelateOptions {
            sort: SortOrder::TimeCreated,
        },
    );
    let lines: Vec<i64> = time_order.iter().map(|e| e.line_number().unwrap()).collect();
    assert_eq!(lines, vec![2, 1]);
}
