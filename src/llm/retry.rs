//! Bounded exponential backoff around any provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::config::LlmSettings;
use crate::error::LlmError;

use super::provider::{ChatMessage, LlmProvider};

/// Backoff schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base: settings.base_backoff,
            cap: settings.max_backoff,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped, plus up to 10% jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.cap);
        let jitter_ms = (capped.as_millis() as u64) / 10;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        (capped + Duration::from_millis(jitter)).min(self.cap)
    }
}

/// Wraps a provider and retries transient failures.
///
/// A rate-limit hint longer than the computed delay wins, still capped.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let mut attempt = 1;
        loop {
            let err = match self.inner.chat(messages).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                return Err(LlmError::RetriesExhausted {
                    provider: self.inner.model_name().to_string(),
                    attempts: attempt,
                    last: err.to_string(),
                });
            }

            let mut wait = self.policy.delay(attempt);
            if let LlmError::RateLimited {
                retry_after: Some(hint),
                ..
            } = &err
            {
                wait = wait.max(*hint).min(self.policy.cap);
            }
            warn!(
                model = %self.inner.model_name(),
                attempt,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "Transient LLM failure, retrying"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}
