//! Error types for the completion gateway.

use std::time::Duration;
use thiserror::Error;

/// Additional context from provider errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the provider.
    pub http_status: Option<u16>,
    /// Provider-specific error code (e.g. "rate_limit_exceeded").
    pub provider_code: Option<String>,
    /// Request ID from provider (x-request-id header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors surfaced by a completion provider.
///
/// The core never retries these: a failed completion becomes that chunk's
/// error marker and the pass moves on.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider returned a 429.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: Option<ErrorContext>,
    },

    /// Invalid request - permanent error.
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Provider refused the request (content policy, etc.) - permanent error.
    #[error("refused: {message}")]
    Refused {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Provider-side failure.
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
        context: Option<ErrorContext>,
    },

    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration, Option<ErrorContext>),

    /// HTTP/network error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (missing API key, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn rate_limited(retry_after: Duration, context: ErrorContext) -> Self {
        Self::RateLimited {
            retry_after,
            context: Some(context),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: None,
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused {
            message: message.into(),
            context: None,
        }
    }

    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            context: None,
        }
    }

    pub fn provider_with_context(
        provider: &'static str,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            context: Some(context),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Get a short error code for logging and error markers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Refused { .. } => "refused",
            Self::Provider { .. } => "provider_error",
            Self::Timeout(_, _) => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::RateLimited { context, .. } => context.as_ref(),
            Self::InvalidRequest { context, .. } => context.as_ref(),
            Self::Refused { context, .. } => context.as_ref(),
            Self::Provider { context, .. } => context.as_ref(),
            Self::Timeout(_, context) => context.as_ref(),
            Self::Http(_) => None,
            Self::Config(_) => None,
        }
    }

    /// Get the request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}
