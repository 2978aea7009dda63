//! Pipeline graph: nodes and the edges between them.
//!
//! classify → authorize → (redirect | load_context → retrieve)
//! → (execute_actions | reflect)? → generate_response → record_learning.
//! Branches are decided after `authorize` and after `retrieve`.

use serde::{Deserialize, Serialize};

use super::intent::Intent;
use super::types::ConversationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Classify,
    Authorize,
    Redirect,
    LoadContext,
    Retrieve,
    ExecuteActions,
    Reflect,
    GenerateResponse,
    RecordLearning,
}

impl Node {
    pub const ENTRY: Node = Node::Classify;

    /// Check if an edge from `self` to `target` exists.
    pub fn can_transition_to(&self, target: Node) -> bool {
        use Node::*;
        matches!(
            (self, target),
            (Classify, Authorize)
                | (Authorize, Redirect)
                | (Authorize, LoadContext)
                | (LoadContext, Retrieve)
                | (Retrieve, ExecuteActions)
                | (Retrieve, Reflect)
                | (Retrieve, GenerateResponse)
                | (ExecuteActions, GenerateResponse)
                | (Reflect, GenerateResponse)
                | (GenerateResponse, RecordLearning)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redirect | Self::RecordLearning)
    }

    /// The node that follows `self` given the state after `self` ran.
    pub fn next(&self, state: &ConversationState) -> Option<Node> {
        use Node::*;
        match self {
            Classify => Some(Authorize),
            Authorize if state.is_authorized => Some(LoadContext),
            Authorize => Some(Redirect),
            LoadContext => Some(Retrieve),
            Retrieve => Some(route_by_intent(state.intent)),
            ExecuteActions | Reflect => Some(GenerateResponse),
            GenerateResponse => Some(RecordLearning),
            Redirect | RecordLearning => None,
        }
    }
}

fn route_by_intent(intent: Intent) -> Node {
    if intent.is_action() {
        Node::ExecuteActions
    } else if intent == Intent::Reflection {
        Node::Reflect
    } else {
        Node::GenerateResponse
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Classify => "classify",
            Self::Authorize => "authorize",
            Self::Redirect => "redirect",
            Self::LoadContext => "load_context",
            Self::Retrieve => "retrieve",
            Self::ExecuteActions => "execute_actions",
            Self::Reflect => "reflect",
            Self::GenerateResponse => "generate_response",
            Self::RecordLearning => "record_learning",
        };
        write!(f, "{s}")
    }
}
