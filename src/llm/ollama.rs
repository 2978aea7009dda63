//! Ollama `/api/chat` backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSettings;
use crate::error::LlmError;

use super::provider::{ChatMessage, LlmProvider};

const PROVIDER: &str = "ollama";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Non-streaming client for a local or remote Ollama server.
pub struct OllamaProvider {
    client: reqwest::Client,
    host: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OllamaProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            host: settings.host.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.host)
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success status to the error taxonomy. 5xx and 429 are transient.
fn status_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> LlmError {
    let provider = PROVIDER.to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed { provider },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider,
            retry_after,
        },
        s if s.is_server_error() => LlmError::Unavailable {
            provider,
            reason: format!("{s}: {body}"),
        },
        s => LlmError::InvalidResponse {
            provider,
            reason: format!("{s}: {body}"),
        },
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let mut request = self.client.post(self.chat_url()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let resp = request.send().await.map_err(|e| {
            let reason = e.to_string();
            if e.is_connect() {
                LlmError::Unavailable {
                    provider: PROVIDER.to_string(),
                    reason,
                }
            } else {
                LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason,
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let wait = retry_after(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, wait, text));
        }

        let text = resp.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;
        let parsed: ChatResponse = serde_json::from_str(&text)?;

        if let Some(error) = parsed.error {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: error,
            });
        }
        let content = parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response had no message".to_string(),
            })?;

        debug!(model = %self.model, len = content.len(), "Ollama chat completed");
        Ok(content)
    }
}
