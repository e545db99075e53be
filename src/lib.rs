#![forbid(unsafe_code)]

//! # logsift
//!
//! Feed a Windows event-log export that is far too large for any model's
//! context window through an LLM in bounded pieces, then stitch the model's
//! free-form replies back into a verifiable subset of the original log.
//!
//! The pipeline: segment the ordered event stream into token- and
//! time-bounded chunks, run a first triage pass over every chunk, harvest the
//! JSON-shaped "flagged" records the model embedded in its markdown replies,
//! correlate those back to the full-fidelity source events, and run a second
//! pass over just the correlated subset. Every stage boundary is a file
//! artifact, so a run can be inspected or resumed from any stage.

pub mod consolidate;
pub mod correlate;
pub mod event;
pub mod gateway;
pub mod pass;
pub mod pipeline;
pub mod prompt;
pub mod segment;
pub mod tokens;

pub use consolidate::{consolidate, ConsolidatedResult, FlaggedRecord, SourceDocument};
pub use correlate::{correlate, correlate_with, CorrelateOptions, SortOrder};
pub use event::{load_events, Event, InputError};
pub use gateway::{CompletionModel, CompletionPort, CompletionRequest, GenParams, ProviderError};
pub use pass::{run_pass, PassDocument, PassEntry, RateLimitPlan};
pub use pipeline::{PipelineConfig, PipelineError, PipelineOrchestrator, PipelineStage};
pub use prompt::{PromptTemplate, TemplateError};
pub use segment::{segment, Chunk, SegmentParams};
pub use tokens::{TokenCounter, TokenScheme};
