//! Channel trait and the message types adapters exchange with the router.

use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelError;
use crate::security::SurfaceKind;

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Discord,
    Sms,
    Tablet,
    Webhook,
    Terminal,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Sms => "sms",
            Self::Tablet => "tablet",
            Self::Webhook => "webhook",
            Self::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message received from an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: Uuid,
    pub channel: ChannelKind,
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub surface_id: String,
    pub surface_name: String,
    pub surface_kind: SurfaceKind,
    /// `None` when the adapter could not resolve any membership.
    #[serde(default)]
    pub roles: Option<HashSet<String>>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// A direct message with no resolvable roles.
    pub fn new(channel: ChannelKind, sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        let sender_id = sender_id.into();
        Self {
            id: Uuid::new_v4(),
            channel,
            content: content.into(),
            sender_name: sender_id.clone(),
            surface_id: sender_id.clone(),
            surface_name: String::new(),
            sender_id,
            surface_kind: SurfaceKind::Direct,
            roles: None,
            session_id: None,
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self
    }

    pub fn on_surface(
        mut self,
        surface_id: impl Into<String>,
        surface_name: impl Into<String>,
        kind: SurfaceKind,
    ) -> Self {
        self.surface_id = surface_id.into();
        self.surface_name = surface_name.into();
        self.surface_kind = kind;
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Explicit session id, or one per sender per channel per day.
    pub fn session_key(&self) -> String {
        match self.session_id {
            Some(ref id) => id.clone(),
            None => format!(
                "{}_{}_{}",
                self.channel,
                self.sender_id,
                self.received_at.format("%Y%m%d")
            ),
        }
    }
}

/// A reply going back out through an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            session_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Stream of inbound messages from one adapter.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message source and sink.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving. The stream ends when the adapter has no more input.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
