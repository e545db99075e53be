#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use logsift::consolidate::{consolidate, SourceDocument};
use logsift::correlate::{correlate_with, CorrelateOptions, SortOrder};
use logsift::event::load_events;
use logsift::gateway::{CompletionModel, GenParams, OpenRouterAdapter};
use logsift::pass::RateLimitPlan;
use logsift::pipeline::{PipelineConfig, PipelineOrchestrator};
use logsift::segment::SegmentParams;
use logsift::tokens::TokenCounter;

#[derive(Parser)]
#[command(name = "logsift", version, about = "Event-log triage via LLM passes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split an event log into token- and time-bounded part files
    Segment {
        /// JSON array of event objects
        #[arg(long)]
        events: PathBuf,
        /// Output directory for part files
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 50_000)]
        token_budget: usize,
        /// Maximum quiet period within one part, in minutes
        #[arg(long, default_value_t = 60)]
        gap_minutes: i64,
    },
    /// Pull flagged records out of pass output markdown
    Consolidate {
        /// Markdown files to scan, in order
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Match flagged line numbers back to full events
    Correlate {
        #[arg(long)]
        events: PathBuf,
        /// consolidated.json from the consolidate step
        #[arg(long)]
        flagged: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Sort output by TimeCreated instead of source order
        #[arg(long)]
        sort_by_time: bool,
    },
    /// Count tokens in a file
    Count {
        #[arg(long)]
        input: PathBuf,
    },
    /// Run one analysis pass over existing part files (LLM calls)
    Pass {
        /// Part files, in order
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Prompt template (must contain {log_json})
        #[arg(long)]
        prompt: PathBuf,
        /// Output markdown file
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value = "anthropic/claude-sonnet-4")]
        model: String,
        #[arg(long, default_value = "1st Pass Timeline of Log Activity")]
        title: String,
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
        #[arg(long, default_value_t = 8192)]
        max_tokens: u32,
        /// Seconds to wait between calls
        #[arg(long, default_value_t = 8)]
        delay_seconds: u64,
    },
    /// Run the full pipeline (LLM calls)
    Run {
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// First-pass prompt template (must contain {log_json})
        #[arg(long)]
        first_prompt: PathBuf,
        /// Second-pass prompt template (must contain {log_json})
        #[arg(long)]
        second_prompt: PathBuf,
        /// OpenRouter model id
        #[arg(long, default_value = "anthropic/claude-sonnet-4")]
        model: String,
        #[arg(long, default_value_t = 50_000)]
        token_budget: usize,
        #[arg(long, default_value_t = 60)]
        gap_minutes: i64,
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
        #[arg(long, default_value_t = 8192)]
        max_tokens: u32,
        /// Seconds to wait between first-pass calls
        #[arg(long, default_value_t = 8)]
        delay_seconds: u64,
        /// Sort correlated output by TimeCreated instead of source order
        #[arg(long)]
        sort_by_time: bool,
        /// Skip the prompt appendix on the final document
        #[arg(long)]
        no_appendix: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Segment {
            events,
            out,
            token_budget,
            gap_minutes,
        } => {
            let events = load_events(&events)?;
            let params = SegmentParams {
                token_budget,
                time_gap_limit: chrono::Duration::minutes(gap_minutes),
            };
            let chunks = logsift::segment::segment(&events, &TokenCounter::default(), &params)?;
            std::fs::create_dir_all(&out)?;
            for (i, chunk) in chunks.iter().enumerate() {
                let path = out.join(format!("part_{:02}.json", i + 1));
                std::fs::write(&path, chunk.to_pretty_json())?;
                println!("{} ({} events, {} tokens)", path.display(), chunk.len(), chunk.tokens());
            }
        }

        Commands::Consolidate { input, out } => {
            let mut docs = Vec::with_capacity(input.len());
            for path in &input {
                let text = std::fs::read_to_string(path)?;
                docs.push(SourceDocument::new(path.display().to_string(), text));
            }
            let result = consolidate(&docs);
            std::fs::write(&out, serde_json::to_string_pretty(&result)?)?;
            println!("{} flagged record(s) -> {}", result.total_flagged, out.display());
        }

        Commands::Correlate {
            events,
            flagged,
            out,
            sort_by_time,
        } => {
            let events = load_events(&events)?;
            let result = serde_json::from_str(&std::fs::read_to_string(&flagged)?)?;
            let sort = if sort_by_time {
                SortOrder::TimeCreated
            } else {
                SortOrder::Source
            };
            let matched = correlate_with(&events, &result, CorrelateOptions { sort });
            std::fs::write(&out, serde_json::to_string_pretty(&matched)?)?;
            println!("{} event(s) -> {}", matched.len(), out.display());
        }

        Commands::Count { input } => {
            let text = std::fs::read_to_string(&input)?;
            println!("{}", TokenCounter::default().count(&text));
        }

        Commands::Pass {
            input,
            prompt,
            out,
            model,
            title,
            temperature,
            max_tokens,
            delay_seconds,
        } => {
            let template = logsift::prompt::PromptTemplate::load(&prompt)?;
            let mut parts = Vec::with_capacity(input.len());
            for path in &input {
                parts.push(std::fs::read_to_string(path)?);
            }

            let port = OpenRouterAdapter::from_env()?;
            let doc = logsift::pass::run_pass(
                &port,
                &CompletionModel::openrouter(model),
                &template,
                &parts,
                GenParams {
                    temperature,
                    max_tokens,
                    ..GenParams::default()
                },
                &RateLimitPlan {
                    inter_call_delay: Duration::from_secs(delay_seconds),
                    ..RateLimitPlan::default()
                },
                &title,
            )
            .await;

            std::fs::write(&out, doc.render_markdown())?;
            let failed = doc.failed_parts();
            if failed.is_empty() {
                println!("{} part(s) -> {}", doc.entries.len(), out.display());
            } else {
                println!(
                    "{} part(s) -> {} ({} FAILED: {:?})",
                    doc.entries.len(),
                    out.display(),
                    failed.len(),
                    failed
                );
            }
        }

        Commands::Run {
            events,
            out,
            first_prompt,
            second_prompt,
            model,
            token_budget,
            gap_minutes,
            temperature,
            max_tokens,
            delay_seconds,
            sort_by_time,
            no_appendix,
        } => {
            let config = PipelineConfig {
                events_path: events,
                out_dir: out,
                first_prompt_path: first_prompt,
                second_prompt_path: second_prompt,
                model: CompletionModel::openrouter(model),
                segment: SegmentParams {
                    token_budget,
                    time_gap_limit: chrono::Duration::minutes(gap_minutes),
                },
                params: GenParams {
                    temperature,
                    max_tokens,
                    ..GenParams::default()
                },
                plan: RateLimitPlan {
                    inter_call_delay: Duration::from_secs(delay_seconds),
                    ..RateLimitPlan::default()
                },
                sort: if sort_by_time {
                    SortOrder::TimeCreated
                } else {
                    SortOrder::Source
                },
                append_prompts: !no_appendix,
            };

            let port = OpenRouterAdapter::from_env()?;
            let orchestrator = PipelineOrchestrator::prepare(config)?;
            let manifest = orchestrator.run(&port).await?;
            println!("run {} complete: {} part(s), {} flagged, {} correlated",
                manifest.run_id, manifest.part_count, manifest.flagged_total,
                manifest.correlated_count);
        }
    }

    Ok(())
}
