//! Error types for Aurora.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Could not determine a home directory for {0}")]
    NoHomeDir(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Inference backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Gave up on {provider} after {attempts} attempts: {last}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        last: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether a retry could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed { .. } | Self::RateLimited { .. } | Self::Unavailable { .. }
        )
    }
}

/// Pattern store / flat-file persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Corrupt record in {path} line {line}: {reason}")]
    Corrupt {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Founder profile errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Unknown profile preference: {0}")]
    UnknownPreference(String),

    #[error("Invalid value for preference {key}: {reason}")]
    InvalidPreference { key: String, reason: String },

    #[error("Profile storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Stage {stage} failed: {reason}")]
    Stage { stage: String, reason: String },

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for Aurora.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_llm_errors() {
        assert!(
            LlmError::Unavailable {
                provider: "ollama".into(),
                reason: "connection refused".into(),
            }
            .is_transient()
        );
        assert!(
            !LlmError::AuthFailed {
                provider: "ollama".into(),
            }
            .is_transient()
        );
        assert!(
            !LlmError::InvalidResponse {
                provider: "ollama".into(),
                reason: "no message".into(),
            }
            .is_transient()
        );
    }

    #[test]
    fn pipeline_error_wraps_llm_error() {
        let err: PipelineError = LlmError::AuthFailed {
            provider: "ollama".into(),
        }
        .into();
        assert!(err.to_string().contains("Authentication failed"));
    }
}
