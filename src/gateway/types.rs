//! Core types for the completion gateway.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Completion model specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionModel {
    /// OpenRouter model, e.g. "anthropic/claude-sonnet-4"
    OpenRouter(String),
}

impl CompletionModel {
    pub fn openrouter(model_id: impl Into<String>) -> Self {
        CompletionModel::OpenRouter(model_id.into())
    }

    pub fn model_id(&self) -> &str {
        match self {
            CompletionModel::OpenRouter(id) => id,
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            CompletionModel::OpenRouter(_) => "openrouter",
        }
    }
}

/// Generation parameters carried through to the provider request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenParams {
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Nucleus sampling parameter.
    pub top_p: f32,
}

impl Default for GenParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 8192,
            top_p: 0.9,
        }
    }
}

/// Request for a single text completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model to use.
    pub model: CompletionModel,
    /// The fully rendered prompt.
    pub prompt: String,
    /// Generation parameters.
    pub params: GenParams,
}

impl CompletionRequest {
    pub fn new(model: CompletionModel, prompt: impl Into<String>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            params: GenParams::default(),
        }
    }

    pub fn params(mut self, params: GenParams) -> Self {
        self.params = params;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.params.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.params.max_tokens = max;
        self
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("stop") | Some("end_turn") => FinishReason::Stop,
            Some("length") | Some("max_tokens") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(other) => FinishReason::Unknown(other.to_string()),
            None => FinishReason::Unknown("none".to_string()),
        }
    }
}

/// Response from a completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The model's final text reply, verbatim.
    pub text: String,
    /// Input tokens consumed, as reported by the provider.
    pub input_tokens: u32,
    /// Output tokens generated, as reported by the provider.
    pub output_tokens: u32,
    /// Time taken for the request.
    pub latency: Duration,
    /// Why the model stopped.
    pub finish_reason: FinishReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = CompletionRequest::new(CompletionModel::openrouter("test/model"), "hi")
            .temperature(0.2)
            .max_tokens(1234);
        assert_eq!(req.params.temperature, 0.2);
        assert_eq!(req.params.max_tokens, 1234);
        assert_eq!(req.model.model_id(), "test/model");
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from(Some("stop".to_string())), FinishReason::Stop);
        assert_eq!(
            FinishReason::from(Some("max_tokens".to_string())),
            FinishReason::Length
        );
        assert_eq!(FinishReason::from(None), FinishReason::Unknown("none".into()));
    }
}
