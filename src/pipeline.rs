//! End-to-end triage pipeline: segment → first pass → consolidate →
//! correlate → second pass.
//!
//! Every stage leaves an artifact on disk under the run's output directory,
//! so a partial run can be inspected and any stage's output re-used:
//!
//! ```text
//! out/
//!   parts/part_01.json ...   segmented chunks, pretty JSON
//!   pass1.md                 first-pass timeline, one section per part
//!   consolidated.json        flagged records pulled out of pass1.md
//!   correlated.json          full events matching the flagged line numbers
//!   pass2.md                 final timeline over the correlated events
//!   run.json                 manifest: ids, counts, failures, token estimate
//! ```
//!
//! Inputs are loaded and validated up front — bad events or a bad template
//! abort the run before the first provider call is paid for.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::consolidate::{self, ConsolidatedResult, SourceDocument};
use crate::correlate::{correlate_with, CorrelateOptions, SortOrder};
use crate::event::{self, Event, InputError};
use crate::gateway::{CompletionModel, CompletionPort, GenParams};
use crate::pass::{run_pass, PassDocument, RateLimitPlan};
use crate::prompt::{PromptTemplate, TemplateError, LOG_PLACEHOLDER};
use crate::segment::{segment, Chunk, SegmentParams};
use crate::tokens::TokenCounter;

/// Heading of the first-pass document.
pub const FIRST_PASS_TITLE: &str = "1st Pass Timeline of Log Activity";
/// Heading of the second-pass document.
pub const SECOND_PASS_TITLE: &str = "Timeline of Log Activity";

// =============================================================================
// Types
// =============================================================================

/// Everything a run needs, resolved before anything executes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// JSON array of event objects.
    pub events_path: PathBuf,
    /// Directory artifacts are written under. Created if absent.
    pub out_dir: PathBuf,
    /// First-pass prompt template file.
    pub first_prompt_path: PathBuf,
    /// Second-pass prompt template file.
    pub second_prompt_path: PathBuf,
    /// Model both passes run against.
    pub model: CompletionModel,
    /// Chunking limits.
    pub segment: SegmentParams,
    /// Generation parameters for both passes.
    pub params: GenParams,
    /// Pacing for the first pass. The second pass is a single call and
    /// runs unpaced.
    pub plan: RateLimitPlan,
    /// Ordering of correlated output.
    pub sort: SortOrder,
    /// Append the prompts used as an appendix to the final document.
    pub append_prompts: bool,
}

/// Where a run currently is. Logged at each transition and recorded in the
/// manifest of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Segmenting,
    FirstPass,
    Consolidating,
    Correlating,
    SecondPass,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Segmenting => "segmenting",
            Self::FirstPass => "first_pass",
            Self::Consolidating => "consolidating",
            Self::Correlating => "correlating",
            Self::SecondPass => "second_pass",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("failed to write artifact {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize artifact: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TemplateError> for PipelineError {
    fn from(e: TemplateError) -> Self {
        Self::Input(InputError::Template(e))
    }
}

/// The manifest written to `run.json` when a run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: String,
    pub stage: PipelineStage,
    pub model: String,
    pub event_count: usize,
    pub part_count: usize,
    pub flagged_total: usize,
    pub correlated_count: usize,
    pub first_pass_failed_parts: Vec<usize>,
    pub second_pass_failed_parts: Vec<usize>,
    /// Prompt-side token estimate for the whole run, counted locally.
    pub estimated_input_tokens: usize,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives one run. Construction loads and validates every input; the stages
/// themselves are also exposed individually for partial runs from the CLI.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    events: Vec<Event>,
    first_template: PromptTemplate,
    second_template: PromptTemplate,
    counter: TokenCounter,
}

impl PipelineOrchestrator {
    /// Load events and both templates, failing fast on any bad input.
    pub fn prepare(config: PipelineConfig) -> Result<Self, PipelineError> {
        let events = event::load_events(&config.events_path)?;
        let first_template = PromptTemplate::load(&config.first_prompt_path)?;
        let second_template = PromptTemplate::load(&config.second_prompt_path)?;

        eprintln!(
            "[pipeline] loaded {} event(s) from {}",
            events.len(),
            config.events_path.display()
        );

        Ok(Self {
            config,
            events,
            first_template,
            second_template,
            counter: TokenCounter::default(),
        })
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Segment the loaded events.
    pub fn segment_events(&self) -> Result<Vec<Chunk>, PipelineError> {
        let chunks = segment(&self.events, &self.counter, &self.config.segment)?;
        eprintln!(
            "[pipeline] segmented {} event(s) into {} part(s)",
            self.events.len(),
            chunks.len()
        );
        Ok(chunks)
    }

    /// Write each chunk to `parts/part_NN.json`, pretty-printed, 1-based and
    /// zero-padded so the files list in part order.
    pub fn write_parts(&self, chunks: &[Chunk]) -> Result<Vec<PathBuf>, PipelineError> {
        let dir = self.config.out_dir.join("parts");
        create_dir(&dir)?;

        let mut paths = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let path = dir.join(format!("part_{:02}.json", i + 1));
            write_artifact(&path, &chunk.to_pretty_json())?;
            eprintln!(
                "[pipeline] wrote {} ({} event(s), {} tokens)",
                path.display(),
                chunk.len(),
                chunk.tokens()
            );
            paths.push(path);
        }
        Ok(paths)
    }

    /// Run the first pass over the serialized chunks and write `pass1.md`.
    pub async fn first_pass(
        &self,
        port: &dyn CompletionPort,
        chunks: &[Chunk],
    ) -> Result<PassDocument, PipelineError> {
        let parts: Vec<String> = chunks.iter().map(Chunk::to_pretty_json).collect();
        let doc = run_pass(
            port,
            &self.config.model,
            &self.first_template,
            &parts,
            self.config.params,
            &self.config.plan,
            FIRST_PASS_TITLE,
        )
        .await;

        let path = self.config.out_dir.join("pass1.md");
        write_artifact(&path, &doc.render_markdown())?;
        report_failures("first", &doc);
        Ok(doc)
    }

    /// Extract flagged records from the first-pass document and write
    /// `consolidated.json`.
    pub fn consolidate_pass(
        &self,
        doc: &PassDocument,
    ) -> Result<ConsolidatedResult, PipelineError> {
        let sources: Vec<SourceDocument> = doc
            .entries
            .iter()
            .map(|e| SourceDocument::new(format!("part_{:02}", e.index), e.text.clone()))
            .collect();
        let result = consolidate::consolidate(&sources);

        let path = self.config.out_dir.join("consolidated.json");
        write_artifact(&path, &serde_json::to_string_pretty(&result)?)?;
        Ok(result)
    }

    /// Match flagged line numbers back to full events and write
    /// `correlated.json`.
    pub fn correlate_flagged(
        &self,
        result: &ConsolidatedResult,
    ) -> Result<Vec<Event>, PipelineError> {
        let matched = correlate_with(
            &self.events,
            result,
            CorrelateOptions {
                sort: self.config.sort,
            },
        );

        let path = self.config.out_dir.join("correlated.json");
        write_artifact(&path, &serde_json::to_string_pretty(&matched)?)?;
        Ok(matched)
    }

    /// Run the second pass over the correlated events as a single part and
    /// write `pass2.md`, with `appendix` (if any) after the timeline. No
    /// pacing: there is only one call.
    pub async fn second_pass(
        &self,
        port: &dyn CompletionPort,
        correlated: &[Event],
        appendix: Option<&str>,
    ) -> Result<PassDocument, PipelineError> {
        let parts = vec![serde_json::to_string_pretty(correlated)?];
        let doc = run_pass(
            port,
            &self.config.model,
            &self.second_template,
            &parts,
            self.config.params,
            &RateLimitPlan::none(),
            SECOND_PASS_TITLE,
        )
        .await;

        let mut rendered = doc.render_markdown();
        if let Some(appendix) = appendix {
            rendered.push_str(appendix);
        }

        let path = self.config.out_dir.join("pass2.md");
        write_artifact(&path, &rendered)?;
        report_failures("second", &doc);
        Ok(doc)
    }

    /// Appendix recording what the final document was produced with: the
    /// model, the run's shape, and both prompts. Backticks in template text
    /// are stripped so the code fences stay balanced.
    pub fn run_appendix(
        &self,
        part_count: usize,
        flagged_total: usize,
        estimated_input_tokens: usize,
    ) -> String {
        format!(
            "\n---\n\n## Appendix: Prompts Used\n\n\
             - model: {}\n\
             - parts: {part_count}\n\
             - flagged records: {flagged_total}\n\
             - estimated input tokens: {estimated_input_tokens}\n\n\
             ### First pass\n\n```\n{}\n```\n\n\
             ### Second pass\n\n```\n{}\n```\n",
            self.config.model.model_id(),
            self.first_template.text().replace('`', ""),
            self.second_template.text().replace('`', "")
        )
    }

    /// Prompt-side token estimate: the first template is sent once per part,
    /// each part's serialized form once, and the second template plus the
    /// correlated events once. Template text is counted with its placeholder
    /// removed, since rendering replaces it with the serialized chunk.
    pub fn estimate_input_tokens(&self, chunks: &[Chunk], correlated_json: &str) -> usize {
        let first_template_tokens = self
            .counter
            .count(&self.first_template.text().replace(LOG_PLACEHOLDER, ""));
        let part_tokens: usize = chunks
            .iter()
            .map(|c| self.counter.count(&c.to_pretty_json()))
            .sum();
        first_template_tokens * chunks.len()
            + part_tokens
            + self
                .counter
                .count(&self.second_template.text().replace(LOG_PLACEHOLDER, ""))
            + self.counter.count(correlated_json)
    }

    /// Run every stage in order and write the manifest.
    pub async fn run(&self, port: &dyn CompletionPort) -> Result<RunManifest, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        create_dir(&self.config.out_dir)?;
        eprintln!("[pipeline] run {run_id} starting");

        eprintln!("[pipeline] stage: {}", PipelineStage::Segmenting.as_str());
        let chunks = self.segment_events()?;
        self.write_parts(&chunks)?;

        eprintln!("[pipeline] stage: {}", PipelineStage::FirstPass.as_str());
        let first_doc = self.first_pass(port, &chunks).await?;

        eprintln!("[pipeline] stage: {}", PipelineStage::Consolidating.as_str());
        let consolidated = self.consolidate_pass(&first_doc)?;

        eprintln!("[pipeline] stage: {}", PipelineStage::Correlating.as_str());
        let correlated = self.correlate_flagged(&consolidated)?;

        let correlated_json = serde_json::to_string_pretty(&correlated)?;
        let estimated_input_tokens = self.estimate_input_tokens(&chunks, &correlated_json);
        let appendix = self.config.append_prompts.then(|| {
            self.run_appendix(chunks.len(), consolidated.total_flagged, estimated_input_tokens)
        });

        eprintln!("[pipeline] stage: {}", PipelineStage::SecondPass.as_str());
        let second_doc = self
            .second_pass(port, &correlated, appendix.as_deref())
            .await?;

        let manifest = RunManifest {
            run_id,
            created_at: Utc::now().to_rfc3339(),
            stage: PipelineStage::Done,
            model: self.config.model.model_id().to_string(),
            event_count: self.events.len(),
            part_count: chunks.len(),
            flagged_total: consolidated.total_flagged,
            correlated_count: correlated.len(),
            first_pass_failed_parts: first_doc.failed_parts(),
            second_pass_failed_parts: second_doc.failed_parts(),
            estimated_input_tokens,
        };

        let path = self.config.out_dir.join("run.json");
        write_artifact(&path, &serde_json::to_string_pretty(&manifest)?)?;
        eprintln!(
            "[pipeline] done — {} part(s), {} flagged, {} correlated",
            manifest.part_count, manifest.flagged_total, manifest.correlated_count
        );
        Ok(manifest)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    std::fs::create_dir_all(path).map_err(|source| PipelineError::Artifact {
        path: path.display().to_string(),
        source,
    })
}

fn write_artifact(path: &Path, content: &str) -> Result<(), PipelineError> {
    std::fs::write(path, content).map_err(|source| PipelineError::Artifact {
        path: path.display().to_string(),
        source,
    })
}

fn report_failures(pass: &str, doc: &PassDocument) {
    let failed = doc.failed_parts();
    if !failed.is_empty() {
        eprintln!("[pipeline] {pass} pass: {} part(s) FAILED: {failed:?}", failed.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(PipelineStage::FirstPass.as_str(), "first_pass");
        assert_eq!(PipelineStage::Done.as_str(), "done");
    }
}
