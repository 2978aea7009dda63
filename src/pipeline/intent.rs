//! Intent classification.

use serde::{Deserialize, Serialize};

use super::types::{Message, MessageRole};

/// Confidence reported whenever a rule fires. A matched/unmatched flag,
/// not a calibrated probability.
pub const MATCHED_CONFIDENCE: f32 = 0.8;

/// What a message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Task,
    Workflow,
    AgentSpawn,
    Reflection,
    Wellbeing,
    Question,
    Conversation,
    Unknown,
}

impl Intent {
    /// Intents that dispatch side-effecting actions.
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Task | Self::Workflow | Self::AgentSpawn)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Workflow => "workflow",
            Self::AgentSpawn => "agent_spawn",
            Self::Reflection => "reflection",
            Self::Wellbeing => "wellbeing",
            Self::Question => "question",
            Self::Conversation => "conversation",
            Self::Unknown => "unknown",
        }
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
        }
    }
}

/// Pluggable classifier strategy.
pub trait IntentClassifier: Send + Sync {
    /// Classify one non-empty message text.
    fn classify_text(&self, text: &str) -> Classification;

    /// Classify the latest sender message in `history`.
    /// No sender message at all is `Unknown` with confidence 0.
    fn classify(&self, history: &[Message]) -> Classification {
        history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Sender)
            .map(|m| self.classify_text(&m.text))
            .unwrap_or_else(Classification::unknown)
    }
}

/// Rules in priority order. The first rule with a hit wins.
const RULES: &[(Intent, &[&str])] = &[
    (
        Intent::Task,
        &["task", "tasks", "todo", "todos", "to-do", "add", "create", "remind", "reminder"],
    ),
    (
        Intent::Workflow,
        &["workflow", "workflows", "automate", "automation", "n8n"],
    ),
    (Intent::AgentSpawn, &["spawn", "agent", "agents", "research"]),
    (
        Intent::Reflection,
        &["reflect", "reflection", "learn", "learned", "pattern", "patterns"],
    ),
    (Intent::Wellbeing, &["how are", "feeling", "break", "rest"]),
];

/// Deterministic keyword classifier.
///
/// Single words match whole tokens; phrases match as substrings.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn hits(lower: &str, tokens: &[&str], keywords: &[&str]) -> bool {
        keywords.iter().any(|k| {
            if k.contains(' ') {
                lower.contains(k)
            } else {
                tokens.contains(k)
            }
        })
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify_text(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .filter(|t| !t.is_empty())
            .collect();

        let intent = RULES
            .iter()
            .find(|(_, keywords)| Self::hits(&lower, &tokens, keywords))
            .map(|(intent, _)| *intent)
            .unwrap_or(if lower.contains('?') {
                Intent::Question
            } else {
                Intent::Conversation
            });

        Classification {
            intent,
            confidence: MATCHED_CONFIDENCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(text: &str) -> Intent {
        KeywordClassifier.classify_text(text).intent
    }

    #[test]
    fn keyword_priority_order() {
        assert_eq!(intent("create a task to water the plants"), Intent::Task);
        assert_eq!(intent("automate the invoice workflow"), Intent::Workflow);
        assert_eq!(intent("spawn a research helper"), Intent::AgentSpawn);
        assert_eq!(intent("let's reflect on this week"), Intent::Reflection);
        assert_eq!(intent("I need a break"), Intent::Wellbeing);
        // Task outranks agent spawn.
        assert_eq!(intent("add an agent to the roster"), Intent::Task);
    }

    #[test]
    fn question_mark_without_keywords() {
        assert_eq!(intent("what's new?"), Intent::Question);
        assert_eq!(intent("how are you?"), Intent::Wellbeing);
    }

    #[test]
    fn no_signal_is_conversation() {
        let c = KeywordClassifier.classify_text("hi");
        assert_eq!(c.intent, Intent::Conversation);
        assert_eq!(c.confidence, MATCHED_CONFIDENCE);
    }

    #[test]
    fn tokens_not_substrings() {
        assert_eq!(intent("update my address"), Intent::Conversation);
        assert_eq!(intent("breakfast plans"), Intent::Conversation);
    }

    #[test]
    fn empty_history_is_unknown() {
        let c = KeywordClassifier.classify(&[]);
        assert_eq!(c.intent, Intent::Unknown);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn classifies_latest_sender_message() {
        let history = vec![
            Message::sender("add a task"),
            Message::assistant("Done."),
            Message::sender("thanks"),
        ];
        assert_eq!(
            KeywordClassifier.classify(&history).intent,
            Intent::Conversation
        );
    }
}
