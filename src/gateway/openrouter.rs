//! OpenRouter adapter for text completions.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::types::*;
use super::CompletionPort;

// =============================================================================
// ADAPTER
// =============================================================================

/// Maximum allowed response content length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed prompt characters (~125k tokens).
const MAX_INPUT_CHARS: usize = 500_000;

/// OpenRouter API adapter for chat completions, used as a plain text
/// completion port: one user message in, the final reply text out.
#[derive(Debug, Clone)]
pub struct OpenRouterAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OpenRouterAdapter {
    /// Create from API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(
            api_key,
            "https://openrouter.ai/api/v1",
            Duration::from_secs(300),
        )
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ProviderError::config("OPENROUTER_API_KEY not set"))?;

        let base_url = std::env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1".into());

        let timeout = std::env::var("OPENROUTER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        Self::with_config(api_key, base_url, timeout)
    }

    /// Create with custom configuration.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        let base_url = base_url.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::config("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Extract request ID from response headers.
    fn extract_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Check if an API-level error message indicates a refusal.
    ///
    /// Only ever applied to provider error messages, never to reply content:
    /// a triage reply legitimately opens with phrases like "I can't find
    /// anything suspicious", and reply text must reach the caller verbatim.
    fn is_refusal(msg: &str) -> bool {
        let l = msg.trim_start().to_lowercase();
        let first_line = l.lines().next().unwrap_or("");

        const PREFIXES: &[&str] = &[
            "refus",
            "i cannot",
            "i can't",
            "i won't",
            "i will not",
            "i am unable to",
            "i'm unable to",
            "unable to comply",
            "unable to assist",
            "unable to help",
            "unable to provide",
        ];

        PREFIXES.iter().any(|p| first_line.starts_with(p)) || l.contains("request was refused")
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<String>,
}

// =============================================================================
// COMPLETION PORT IMPL
// =============================================================================

#[async_trait]
impl CompletionPort for OpenRouterAdapter {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if req.prompt.len() > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "Prompt too large: {} chars (max {MAX_INPUT_CHARS})",
                req.prompt.len()
            )));
        }

        let start = Instant::now();

        let messages = [ApiMessage {
            role: "user",
            content: &req.prompt,
        }];

        let api_req = ChatApiRequest {
            model: req.model.model_id(),
            messages: &messages,
            temperature: req.params.temperature,
            max_tokens: req.params.max_tokens,
            top_p: req.params.top_p,
        };

        let mut response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout, None)
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ProviderError::provider(
                    "openrouter",
                    format!("Response too large: {new_len} bytes"),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&bytes).to_string();

        // Build error context
        let ctx = ErrorContext::new().with_status(status.as_u16());
        let ctx = if let Some(id) = &request_id {
            ctx.with_request_id(id)
        } else {
            ctx
        };

        if !status.is_success() {
            if let Ok(parsed) = serde_json::from_str::<ChatApiResponse>(&body) {
                if let Some(error) = parsed.error {
                    let message = error.message.unwrap_or_default();
                    let ctx = if let Some(code) = error.code {
                        ctx.with_code(&code)
                    } else {
                        ctx
                    };

                    return Err(match status.as_u16() {
                        429 => ProviderError::rate_limited(Duration::from_secs(60), ctx),
                        _ => ProviderError::provider_with_context("openrouter", message, ctx),
                    });
                }
            }

            return Err(ProviderError::provider_with_context(
                "openrouter",
                format!("HTTP {}", status.as_u16()),
                ctx,
            ));
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::provider("openrouter", format!("Invalid JSON: {e}")))?;

        // Check for API-level error
        if let Some(error) = parsed.error {
            let message = error.message.unwrap_or_default();
            if Self::is_refusal(&message) {
                return Err(ProviderError::refused(message));
            }
            return Err(ProviderError::provider("openrouter", message));
        }

        let choice = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ProviderError::provider("openrouter", "No choices in response"))?;

        let finish_reason = FinishReason::from(choice.finish_reason);
        let text = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        // The provider's own filter signal is the only content-side refusal
        // marker; the text itself is never inspected.
        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::refused(if text.is_empty() {
                "response stopped by provider content filter".to_string()
            } else {
                text
            }));
        }

        let usage = parsed.usage.unwrap_or(Usage {
            prompt_tokens: None,
            completion_tokens: None,
        });

        Ok(CompletionResponse {
            text,
            input_tokens: usage.prompt_tokens.unwrap_or(0),
            output_tokens: usage.completion_tokens.unwrap_or(0),
            latency: start.elapsed(),
            finish_reason,
        })
    }
}
