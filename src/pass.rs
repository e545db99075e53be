//! Sequential analysis pass over serialized log chunks.
//!
//! Each chunk is rendered into the pass prompt, sent through the completion
//! port, and its reply recorded as a `## Part N` section of a markdown
//! document. Chunks are processed strictly in order with fixed pacing between
//! calls. A failed chunk is never retried: its section gets an error marker
//! and the pass moves on, so one bad part cannot sink a long paid run.

use std::time::Duration;

use crate::gateway::{CompletionModel, CompletionPort, CompletionRequest, GenParams};
use crate::prompt::PromptTemplate;

/// Pacing discipline between provider calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPlan {
    /// Delay after every call.
    pub inter_call_delay: Duration,
    /// Take a long pause after every Nth call, if set.
    pub long_pause_every: Option<usize>,
    /// Duration of the long pause.
    pub long_pause_duration: Duration,
}

impl Default for RateLimitPlan {
    fn default() -> Self {
        Self {
            inter_call_delay: Duration::from_secs(8),
            long_pause_every: Some(7),
            long_pause_duration: Duration::from_secs(100),
        }
    }
}

impl RateLimitPlan {
    /// No pacing at all. Used for single-part passes and tests.
    pub fn none() -> Self {
        Self {
            inter_call_delay: Duration::ZERO,
            long_pause_every: None,
            long_pause_duration: Duration::ZERO,
        }
    }
}

/// One part's outcome within a pass.
#[derive(Debug, Clone)]
pub struct PassEntry {
    /// 1-based part index.
    pub index: usize,
    /// The model's reply verbatim, or the error marker.
    pub text: String,
    /// Whether this part failed.
    pub failed: bool,
}

/// The assembled output of one pass.
#[derive(Debug, Clone)]
pub struct PassDocument {
    /// Document title, rendered as the top-level heading.
    pub title: String,
    /// Per-part entries in input order.
    pub entries: Vec<PassEntry>,
}

impl PassDocument {
    /// Render the document as markdown: a title heading followed by one
    /// `## Part N` section per entry, in order.
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        for entry in &self.entries {
            out.push_str(&format!("## Part {}\n\n{}\n\n", entry.index, entry.text));
        }
        out
    }

    /// Indices of parts that failed.
    pub fn failed_parts(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| e.failed)
            .map(|e| e.index)
            .collect()
    }
}

/// Run one pass: each part rendered through the template, completed in order,
/// results collected into a [`PassDocument`].
pub async fn run_pass(
    port: &dyn CompletionPort,
    model: &CompletionModel,
    template: &PromptTemplate,
    parts: &[String],
    params: GenParams,
    plan: &RateLimitPlan,
    title: &str,
) -> PassDocument {
    let total = parts.len();
    let mut entries = Vec::with_capacity(total);

    for (i, part) in parts.iter().enumerate() {
        let index = i + 1;
        let prompt = template.render(part);

        eprintln!("[pass] part {index}/{total}: sending {} chars", prompt.len());

        let req = CompletionRequest::new(model.clone(), prompt).params(params);
        let entry = match port.complete(req).await {
            Ok(resp) => {
                eprintln!(
                    "[pass] part {index}/{total}: ok ({} output tokens, {:?})",
                    resp.output_tokens, resp.latency
                );
                PassEntry {
                    index,
                    text: resp.text,
                    failed: false,
                }
            }
            Err(err) => {
                eprintln!("[pass] part {index}/{total}: FAILED ({}): {err}", err.code());
                PassEntry {
                    index,
                    text: format!("> **[provider error]** part {index} (`{}`): {err}", err.code()),
                    failed: true,
                }
            }
        };
        entries.push(entry);

        // Pacing applies after every call, including the last.
        if plan.inter_call_delay > Duration::ZERO {
            tokio::time::sleep(plan.inter_call_delay).await;
        }
        if let Some(every) = plan.long_pause_every {
            if every > 0 && index % every == 0 {
                eprintln!(
                    "[pass] long pause after part {index}: sleeping {:?}",
                    plan.long_pause_duration
                );
                tokio::time::sleep(plan.long_pause_duration).await;
            }
        }
    }

    PassDocument {
        title: title.to_string(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_sections_in_order() {
        let doc = PassDocument {
            title: "1st Pass Timeline of Log Activity".into(),
            entries: vec![
                PassEntry {
                    index: 1,
                    text: "first".into(),
                    failed: false,
                },
                PassEntry {
                    index: 2,
                    text: "second".into(),
                    failed: false,
                },
            ],
        };
        let md = doc.render_markdown();
        assert!(md.starts_with("# 1st Pass Timeline of Log Activity\n\n"));
        let p1 = md.find("## Part 1").unwrap();
        let p2 = md.find("## Part 2").unwrap();
        assert!(p1 < p2);
    }

    #[test]
    fn failed_parts_reported() {
        let doc = PassDocument {
            title: "t".into(),
            entries: vec![
                PassEntry {
                    index: 1,
                    text: "ok".into(),
                    failed: false,
                },
                PassEntry {
                    index: 2,
                    text: "> **[provider error]** part 2 (`timeout`): timeout after 300s".into(),
                    failed: true,
                },
            ],
        };
        assert_eq!(doc.failed_parts(), vec![2]);
    }
}
