//! Message-processing pipeline.
//!
//! Every authorized message flows through the same graph:
//! 1. `classify`: keyword intent classifier (pluggable)
//! 2. `authorize`: access gate plus protected-topic pre-check
//! 3. `load_context` / `retrieve`: guarded profile, documents, patterns
//! 4. `execute_actions` or `reflect`, depending on intent
//! 5. `generate_response`: model call, then all-or-nothing redaction
//! 6. `record_learning`: observations behind the learning gate
//!
//! Refused senders exit at `redirect` with no context, documents or actions.

pub mod graph;
pub mod intent;
pub mod orchestrator;
pub mod types;

pub use graph::Node;
pub use intent::{Classification, Intent, IntentClassifier, KeywordClassifier};
pub use orchestrator::{Orchestrator, PipelineDeps};
pub use types::{
    Action, ActionType, ConversationState, Message, MessageRole, SenderSnapshot, SessionSummary,
    Tone,
};
