//! LLM integration for Aurora.
//!
//! The pipeline talks to a `LlmProvider`. The bundled backend is Ollama's
//! `/api/chat`, wrapped in `RetryingProvider` so transient failures get
//! bounded exponential backoff before the pipeline sees an error.

pub mod ollama;
pub mod provider;
pub mod retry;

pub use ollama::OllamaProvider;
pub use provider::{ChatMessage, LlmProvider, Role};
pub use retry::{RetryPolicy, RetryingProvider};

use std::sync::Arc;

use crate::config::LlmSettings;
use crate::error::LlmError;

/// Create the configured provider, retry wrapper included.
pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let ollama: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(settings)?);
    tracing::info!(
        "Using Ollama at {} (model: {}, max attempts: {})",
        settings.host,
        settings.model,
        settings.max_attempts
    );
    Ok(Arc::new(RetryingProvider::new(
        ollama,
        RetryPolicy::from_settings(settings),
    )))
}
