//! Conversation state and the records stages pass along.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::learning::{Document, Observation};
use crate::profile::ProfileSnapshot;
use crate::security::{SecurityContext, SecurityLevel};

use super::graph::Node;
use super::intent::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Sender,
    System,
    Assistant,
}

/// One entry in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Opaque adapter metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Message {
    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn sender(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Sender, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    TaskOperation,
    WorkflowOperation,
    SpawnAgent,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskOperation => "task_operation",
            Self::WorkflowOperation => "workflow_operation",
            Self::SpawnAgent => "spawn_agent",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A side effect taken during a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub success: bool,
}

/// Reply register chosen from the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Warm,
    Practical,
    Collaborative,
}

impl Tone {
    pub fn for_intent(intent: Intent) -> Self {
        match intent {
            Intent::Wellbeing => Self::Warm,
            Intent::Task => Self::Practical,
            _ => Self::Collaborative,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warm => "warm",
            Self::Practical => "practical",
            Self::Collaborative => "collaborative",
        }
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self::Collaborative
    }
}

/// The part of a `SecurityContext` kept on the state. No role set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderSnapshot {
    pub sender_id: String,
    pub sender_name: String,
    pub level: SecurityLevel,
    pub is_secure_surface: bool,
}

impl From<&SecurityContext> for SenderSnapshot {
    fn from(ctx: &SecurityContext) -> Self {
        Self {
            sender_id: ctx.sender_id.clone(),
            sender_name: ctx.sender_name.clone(),
            level: ctx.level,
            is_secure_surface: ctx.is_secure_surface,
        }
    }
}

/// Per-session conversation state.
///
/// `messages` persists across turns; everything else describes the current
/// turn and is cleared by [`ConversationState::begin_turn`]. When
/// `is_authorized` is false, `documents`, `context` and `actions` stay empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub channel: String,
    pub session_id: String,

    pub is_authorized: bool,
    pub sender: Option<SenderSnapshot>,
    pub profile: Option<ProfileSnapshot>,

    pub documents: Vec<Document>,
    pub context: String,

    pub intent: Intent,
    pub confidence: f32,
    pub entities: HashMap<String, Vec<String>>,

    pub response: String,
    pub rationale: String,
    pub tone: Tone,

    pub actions: Vec<Action>,
    pub spawned_agents: Vec<String>,
    pub observations: Vec<Observation>,
    pub reminder: Option<String>,
    pub redirect: Option<String>,
    /// Learning-path id for this turn's exchange, for later feedback.
    pub interaction_id: Option<Uuid>,

    /// Nodes visited this turn, in order.
    pub visited: Vec<Node>,
}

impl ConversationState {
    pub fn new(channel: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Reset per-turn fields, keeping history and identifiers.
    pub fn begin_turn(&mut self) {
        let messages = std::mem::take(&mut self.messages);
        let channel = std::mem::take(&mut self.channel);
        let session_id = std::mem::take(&mut self.session_id);
        *self = Self {
            messages,
            channel,
            session_id,
            ..Default::default()
        };
    }

    /// The latest sender message text, if any.
    pub fn latest_sender_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Sender)
            .map(|m| m.text.as_str())
    }

    pub fn sender_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Sender)
            .count()
    }

    pub fn has_visited(&self, node: Node) -> bool {
        self.visited.contains(&node)
    }
}

/// Returned by `end_session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub actions_taken: usize,
    pub observations: usize,
    pub spawned_agents: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_turn_keeps_history_only() {
        let mut state = ConversationState::new("terminal", "s1");
        state.messages.push(Message::sender("hi"));
        state.is_authorized = true;
        state.context = "ctx".into();
        state.visited.push(Node::Classify);

        state.begin_turn();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.session_id, "s1");
        assert_eq!(state.channel, "terminal");
        assert!(!state.is_authorized);
        assert!(state.context.is_empty());
        assert!(state.visited.is_empty());
    }

    #[test]
    fn tone_follows_intent() {
        assert_eq!(Tone::for_intent(Intent::Wellbeing), Tone::Warm);
        assert_eq!(Tone::for_intent(Intent::Task), Tone::Practical);
        assert_eq!(Tone::for_intent(Intent::Question), Tone::Collaborative);
    }

    #[test]
    fn action_types_use_wire_names() {
        let json = serde_json::to_value(ActionType::TaskOperation).unwrap();
        assert_eq!(json, "task_operation");
        assert_eq!(ActionType::SpawnAgent.as_str(), "spawn_agent");
    }
}
