//! Completion gateway: the pipeline's one external capability.
//!
//! The core treats text completion as an opaque port — a prompt goes in, a
//! final text reply comes out, failures surface as a typed [`ProviderError`].
//! Retry policy deliberately does not live here; the pass runner's rate-limit
//! discipline is the only throttling defense, and a failed chunk is recorded
//! and skipped rather than retried.

pub mod error;
pub mod openrouter;
pub mod types;

pub use error::{ErrorContext, ProviderError};
pub use openrouter::OpenRouterAdapter;
pub use types::*;

#[async_trait::async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}
