use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use logsift::correlate::SortOrder;
use logsift::event::Event;
use logsift::gateway::{
    CompletionModel, CompletionPort, CompletionRequest, CompletionResponse, FinishReason,
    GenParams, ProviderError,
};
use logsift::pass::RateLimitPlan;
use logsift::pipeline::{PipelineConfig, PipelineOrchestrator, PipelineStage};
use logsift::segment::SegmentParams;
use logsift::tokens::TokenCounter;
use serde_json::json;

/// Port that flags line 2 on the first call and narrates on every call after.
struct TriagePort {
    calls: AtomicUsize,
}

impl TriagePort {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompletionPort for TriagePort {
    async fn complete(&self, _req: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = if call == 0 {
            "Routine activity, one exception:\n\n\
             {\"LineNumber\": 2, \"Summary\": \"Unexpected restart\", \"Reason\": \"No patch scheduled\"}\n"
                .to_string()
        } else {
            "The flagged events form a single restart sequence.".to_string()
        };
        Ok(CompletionResponse {
            text,
            input_tokens: 5,
            output_tokens: 5,
            latency: std::time::Duration::from_millis(1),
            finish_reason: FinishReason::Stop,
        })
    }
}

fn write_fixtures(dir: &Path) -> PipelineConfig {
    let events = json!([
        { "LineNumber": 1, "TimeCreated": "2024-03-01T08:00:00Z", "Message": "startup" },
        { "LineNumber": 2, "TimeCreated": "2024-03-01T08:05:00Z", "Message": "restart" },
        { "LineNumber": 3, "TimeCreated": "2024-03-01T08:10:00Z", "Message": "shutdown" }
    ]);
    let events_path = dir.join("events.json");
    std::fs::write(&events_path, serde_json::to_string_pretty(&events).unwrap()).unwrap();

    let first_prompt_path = dir.join("first.txt");
    std::fs::write(
        &first_prompt_path,
        "Triage these `events`:\n{log_json}\n",
    )
    .unwrap();
    let second_prompt_path = dir.join("second.txt");
    std::fs::write(&second_prompt_path, "Build a timeline:\n{log_json}\n").unwrap();

    PipelineConfig {
        events_path,
        out_dir: dir.join("out"),
        first_prompt_path,
        second_prompt_path,
        model: CompletionModel::openrouter("test/model"),
        segment: SegmentParams {
            token_budget: 50_000,
            time_gap_limit: chrono::Duration::hours(1),
        },
        params: GenParams::default(),
        plan: RateLimitPlan::none(),
        sort: SortOrder::Source,
        append_prompts: true,
    }
}

#[tokio::test]
async fn full_run_produces_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixtures(dir.path());
    let out = config.out_dir.clone();

    let orchestrator = PipelineOrchestrator::prepare(config).unwrap();
    let port = TriagePort::new();
    let manifest = orchestrator.run(&port).await.unwrap();

    assert_eq!(manifest.stage, PipelineStage::Done);
    assert_eq!(manifest.event_count, 3);
    assert_eq!(manifest.part_count, 1);
    assert_eq!(manifest.flagged_total, 1);
    assert_eq!(manifest.correlated_count, 1);
    assert!(manifest.first_pass_failed_parts.is_empty());
    assert!(manifest.second_pass_failed_parts.is_empty());

    // Token estimate counts template text without the placeholder (rendering
    // replaces it), the part payloads, and the correlated payload.
    let counter = TokenCounter::default();
    let part_json = std::fs::read_to_string(out.join("parts/part_01.json")).unwrap();
    let correlated_json = std::fs::read_to_string(out.join("correlated.json")).unwrap();
    let expected = counter.count(&"Triage these `events`:\n{log_json}\n".replace("{log_json}", ""))
        + counter.count(&part_json)
        + counter.count(&"Build a timeline:\n{log_json}\n".replace("{log_json}", ""))
        + counter.count(&correlated_json);
    assert_eq!(manifest.estimated_input_tokens, expected);

    // Part files are pretty JSON arrays of the original events.
    let part: Vec<Event> =
        serde_json::from_str(&std::fs::read_to_string(out.join("parts/part_01.json")).unwrap())
            .unwrap();
    assert_eq!(part.len(), 3);

    let pass1 = std::fs::read_to_string(out.join("pass1.md")).unwrap();
    assert!(pass1.starts_with("# 1st Pass Timeline of Log Activity\n\n## Part 1\n\n"));
    assert!(pass1.contains("Unexpected restart"));

    let consolidated: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("consolidated.json")).unwrap())
            .unwrap();
    assert_eq!(consolidated["total_flagged"], 1);
    assert_eq!(
        consolidated["consolidated_flagged_records"][0]["LineNumber"],
        2
    );

    // Correlated output carries the full original event, untouched.
    let correlated: Vec<Event> =
        serde_json::from_str(&std::fs::read_to_string(out.join("correlated.json")).unwrap())
            .unwrap();
    assert_eq!(correlated.len(), 1);
    assert_eq!(correlated[0].line_number(), Some(2));
    assert_eq!(
        correlated[0].get("Message").and_then(|v| v.as_str()),
        Some("restart")
    );

    let pass2 = std::fs::read_to_string(out.join("pass2.md")).unwrap();
    assert!(pass2.starts_with("# Timeline of Log Activity\n\n## Part 1\n\n"));
    assert!(pass2.contains("single restart sequence"));
    assert!(pass2.contains("## Appendix: Prompts Used"));
    assert!(pass2.contains("- model: test/model"));
    // Backticks in template text are stripped inside the appendix fences.
    assert!(pass2.contains("Triage these events:"));

    let manifest_on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("run.json")).unwrap()).unwrap();
    assert_eq!(manifest_on_disk["run_id"], manifest.run_id.as_str());
    assert_eq!(manifest_on_disk["stage"], "done");
    assert_eq!(manifest_on_disk["model"], "test/model");
}

#[tokio::test]
async fn gap_in_events_yields_two_parts_and_two_first_pass_calls() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_fixtures(dir.path());

    let events = json!([
        { "LineNumber": 1, "TimeCreated": "2024-03-01T08:00:00Z", "Message": "a" },
        { "LineNumber": 2, "TimeCreated": "2024-03-01T12:00:00Z", "Message": "b" }
    ]);
    std::fs::write(
        &config.events_path,
        serde_json::to_string_pretty(&events).unwrap(),
    )
    .unwrap();
    config.out_dir = dir.path().join("out2");

    let orchestrator = PipelineOrchestrator::prepare(config).unwrap();
    let port = TriagePort::new();
    let manifest = orchestrator.run(&port).await.unwrap();

    assert_eq!(manifest.part_count, 2);
    // Two first-pass calls plus one second-pass call.
    assert_eq!(port.calls.load(Ordering::SeqCst), 3);
    assert!(dir.path().join("out2/parts/part_02.json").exists());
}

#[tokio::test]
async fn bad_timestamp_aborts_before_any_provider_call() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_fixtures(dir.path());

    let events = json!([
        { "LineNumber": 1, "TimeCreated": "yesterday-ish", "Message": "a" }
    ]);
    std::fs::write(
        &config.events_path,
        serde_json::to_string_pretty(&events).unwrap(),
    )
    .unwrap();
    config.out_dir = dir.path().join("out3");

    let orchestrator = PipelineOrchestrator::prepare(config).unwrap();
    let port = TriagePort::new();
    let err = orchestrator.run(&port).await.unwrap_err();

    assert!(err.to_string().contains("TimeCreated"));
    assert_eq!(port.calls.load(Ordering::SeqCst), 0);
    assert!(!dir.path().join("out3/pass1.md").exists());
}

#[tokio::test]
async fn missing_placeholder_fails_at_prepare() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixtures(dir.path());
    std::fs::write(&config.first_prompt_path, "no placeholder").unwrap();

    assert!(PipelineOrchestrator::prepare(config).is_err());
}
