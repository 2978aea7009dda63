//! Orchestrator: runs one message through the pipeline graph.
//!
//! Each session owns one `ConversationState` behind its own mutex, so turns
//! for a session run strictly in sequence while different sessions proceed
//! concurrently. Stages take the state by value and return the next version.
//! Stage errors propagate to the caller untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::actions::ActionDispatcher;
use crate::config::AuroraConfig;
use crate::error::PipelineError;
use crate::learning::{AssemblyInput, ContextAssembler, Interaction, Observation, PatternStore};
use crate::llm::{ChatMessage, LlmProvider};
use crate::profile::ProfileManager;
use crate::security::{AccessDecision, AccessPolicy, SecurityContext, TopicGuard};
use crate::wellbeing::WellbeingMonitor;

use super::graph::Node;
use super::intent::{Intent, IntentClassifier, KeywordClassifier};
use super::types::{ConversationState, Message, MessageRole, SessionSummary, Tone};

/// Rationale recorded when retrieval is withheld.
pub const PROTECTED_RATIONALE: &str = "This topic touches on protected areas. Proceeding carefully.";

/// Collaborators the pipeline calls into.
pub struct PipelineDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub profile: Arc<ProfileManager>,
    pub patterns: Arc<PatternStore>,
    pub context: Arc<ContextAssembler>,
    pub wellbeing: Arc<WellbeingMonitor>,
    pub dispatcher: Arc<ActionDispatcher>,
}

/// Running totals for `end_session`.
#[derive(Debug, Default)]
struct SessionLedger {
    actions_taken: usize,
    observations: usize,
    spawned_agents: Vec<String>,
}

struct Session {
    state: ConversationState,
    ledger: SessionLedger,
}

pub struct Orchestrator {
    config: Arc<AuroraConfig>,
    policy: AccessPolicy,
    guard: TopicGuard,
    classifier: Arc<dyn IntentClassifier>,
    deps: PipelineDeps,
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<AuroraConfig>,
        policy: AccessPolicy,
        guard: TopicGuard,
        deps: PipelineDeps,
    ) -> Self {
        Self {
            config,
            policy,
            guard,
            classifier: Arc::new(KeywordClassifier),
            deps,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Swap in a different intent classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// The respond/redirect gate, for adapters that check before calling in.
    pub fn decide(&self, sender: &SecurityContext) -> AccessDecision {
        self.policy.decide(sender)
    }

    /// Deflection text when `text` raises a protected topic and the sender
    /// lacks full access on this surface.
    pub fn deflection(&self, text: &str, sender: &SecurityContext) -> Option<String> {
        let full_access = sender.is_secure_surface && sender.level.has_full_access();
        if full_access {
            return None;
        }
        self.guard.scan(text).map(str::to_string)
    }

    /// Outbound redaction for replies produced outside the pipeline.
    pub fn redact(&self, reply: &str, sender: &SecurityContext) -> String {
        self.guard.redact(reply, sender)
    }

    async fn session(&self, session_id: &str, channel: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session = %session_id, %channel, "Session opened");
                Arc::new(Mutex::new(Session {
                    state: ConversationState::new(channel, session_id),
                    ledger: SessionLedger::default(),
                }))
            })
            .clone()
    }

    /// Process one inbound message and return the reply text.
    ///
    /// The inbound message stays in history even if a stage fails; the rest
    /// of a failed turn is discarded.
    pub async fn process_message(
        &self,
        text: &str,
        channel: &str,
        session_id: &str,
        sender: &SecurityContext,
    ) -> Result<String, PipelineError> {
        let session = self.session(session_id, channel).await;
        let mut session = session.lock().await;

        session.state.messages.push(Message::sender(text));
        let mut state = session.state.clone();
        state.begin_turn();
        state.channel = channel.to_string();

        let mut node = Node::ENTRY;
        loop {
            state = self.run_node(node, state, sender).await?;
            state.visited.push(node);
            match node.next(&state) {
                Some(next) => {
                    debug_assert!(node.can_transition_to(next));
                    node = next;
                }
                None => break,
            }
        }

        let reply = state.response.clone();
        state.messages.push(Message::assistant(&reply));

        session.ledger.actions_taken += state.actions.len();
        session.ledger.observations += state.observations.len();
        session
            .ledger
            .spawned_agents
            .extend(state.spawned_agents.iter().cloned());

        info!(
            session = %session_id,
            %channel,
            intent = %state.intent,
            authorized = state.is_authorized,
            path = %state.visited.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(">"),
            "Turn complete"
        );
        session.state = state;
        Ok(reply)
    }

    async fn run_node(
        &self,
        node: Node,
        state: ConversationState,
        sender: &SecurityContext,
    ) -> Result<ConversationState, PipelineError> {
        match node {
            Node::Classify => Ok(self.classify(state)),
            Node::Authorize => Ok(self.authorize(state, sender)),
            Node::Redirect => Ok(redirect(state)),
            Node::LoadContext => self.load_context(state).await,
            Node::Retrieve => self.retrieve(state, sender).await,
            Node::ExecuteActions => Ok(self.execute_actions(state).await),
            Node::Reflect => Ok(self.reflect(state).await),
            Node::GenerateResponse => self.generate_response(state, sender).await,
            Node::RecordLearning => self.record_learning(state).await,
        }
    }

    fn classify(&self, mut state: ConversationState) -> ConversationState {
        let c = self.classifier.classify(&state.messages);
        state.intent = c.intent;
        state.confidence = c.confidence;
        if let Some(entities) = state.latest_sender_text().map(extract_entities) {
            state.entities = entities;
        }
        debug!(intent = %c.intent, confidence = c.confidence, "Classified");
        state
    }

    fn authorize(&self, mut state: ConversationState, sender: &SecurityContext) -> ConversationState {
        state.sender = Some(sender.into());
        match self.policy.decide(sender) {
            AccessDecision::Respond => {
                let deflection = state
                    .latest_sender_text()
                    .and_then(|text| self.deflection(text, sender));
                if let Some(message) = deflection {
                    warn!(sender = %sender.sender_name, "Protected topic raised off a secure surface");
                    state.redirect = Some(message);
                } else {
                    state.is_authorized = true;
                }
            }
            AccessDecision::Redirect(text) => state.redirect = Some(text),
        }
        state
    }

    async fn load_context(
        &self,
        mut state: ConversationState,
    ) -> Result<ConversationState, PipelineError> {
        let profile = self.deps.profile.load().await?;
        let snapshot = self.deps.profile.snapshot().await?;
        let message = state.latest_sender_text().unwrap_or_default().to_string();
        let patterns = self.deps.patterns.get_relevant_patterns(&message).await;

        state.reminder = self.deps.wellbeing.check_at(Utc::now()).await?;
        state.context = self.deps.context.assemble(&AssemblyInput {
            message: &message,
            profile: &profile,
            snapshot: &snapshot,
            documents: &[],
            patterns: &patterns,
        });
        state.profile = Some(snapshot);
        Ok(state)
    }

    async fn retrieve(
        &self,
        mut state: ConversationState,
        sender: &SecurityContext,
    ) -> Result<ConversationState, PipelineError> {
        let Some(message) = state.latest_sender_text().map(str::to_string) else {
            return Ok(state);
        };
        let profile = self.deps.profile.load().await?;
        let full_access = sender.is_secure_surface && sender.level.has_full_access();

        if !profile.is_shareable(&message) || (!full_access && self.guard.contains_protected(&message)) {
            state.documents.clear();
            state.rationale = PROTECTED_RATIONALE.to_string();
            return Ok(state);
        }

        state.documents = self.deps.context.retrieve(&message, &profile).await;
        if !state.documents.is_empty() {
            let snapshot = state.profile.clone().unwrap_or_else(|| profile.snapshot());
            let patterns = self.deps.patterns.get_relevant_patterns(&message).await;
            state.context = self.deps.context.assemble(&AssemblyInput {
                message: &message,
                profile: &profile,
                snapshot: &snapshot,
                documents: &state.documents,
                patterns: &patterns,
            });
        }
        debug!(documents = state.documents.len(), "Retrieved");
        Ok(state)
    }

    async fn execute_actions(&self, mut state: ConversationState) -> ConversationState {
        let message = state.latest_sender_text().unwrap_or_default().to_string();
        let dispatched = self
            .deps
            .dispatcher
            .dispatch(state.intent, &message, &state.session_id)
            .await;
        state.actions = dispatched.actions;
        state.spawned_agents = dispatched.spawned_agents;
        state
    }

    async fn reflect(&self, mut state: ConversationState) -> ConversationState {
        let summary = self.deps.patterns.domain_summary().await;
        let pending = self.deps.patterns.pending_observations().await.len();
        let counts = summary
            .iter()
            .map(|(domain, n)| format!("{domain} {n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let note = format!(
            "**Reflection:**\n- Learned patterns: {counts}\n- Observations awaiting review: {pending}"
        );
        state.context = if state.context.is_empty() {
            note
        } else {
            format!("{}\n\n{note}", state.context)
        };
        state.rationale = format!("Reflecting with {pending} pending observations");
        state
    }

    fn build_prompt(&self, state: &ConversationState) -> Vec<ChatMessage> {
        let name = state
            .profile
            .as_ref()
            .map(|p| p.preferred_name.as_str())
            .unwrap_or("the founder");
        let mut system = format!(
            "You are {}, a personal assistant and thinking partner to {name}. \
             Tone: {}. Be concise and honest. Never discuss protected projects.",
            self.config.agent_name,
            state.tone.as_str()
        );
        if !state.context.is_empty() {
            system.push_str("\n\n");
            system.push_str(&state.context);
        }
        if state.intent == Intent::Wellbeing
            && let Some(ref reminder) = state.reminder
        {
            system.push_str("\n\nAlso gently mention: ");
            system.push_str(reminder);
        }
        if !state.actions.is_empty() {
            system.push_str("\n\nActions already taken this turn:");
            for action in &state.actions {
                system.push_str(&format!("\n- {}", action.description));
            }
        }

        let window = self.config.history_window * 2;
        let start = state.messages.len().saturating_sub(window);
        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(state.messages[start..].iter().map(|m| match m.role {
            MessageRole::Sender => ChatMessage::user(&m.text),
            MessageRole::Assistant => ChatMessage::assistant(&m.text),
            MessageRole::System => ChatMessage::system(&m.text),
        }));
        messages
    }

    async fn generate_response(
        &self,
        mut state: ConversationState,
        sender: &SecurityContext,
    ) -> Result<ConversationState, PipelineError> {
        state.tone = Tone::for_intent(state.intent);
        let prompt = self.build_prompt(&state);
        let mut reply = self.deps.llm.chat(&prompt).await?.trim().to_string();

        let confirmations: Vec<String> = state
            .actions
            .iter()
            .filter(|a| a.success)
            .filter_map(|a| a.result.clone())
            .collect();
        if !confirmations.is_empty() {
            reply = format!("{reply}\n\n{}", confirmations.join("\n"));
        }

        if state.intent != Intent::Wellbeing
            && let Some(ref reminder) = state.reminder
        {
            reply = format!("{reply}\n\nP.S. {reminder}");
        }

        state.response = self.guard.redact(&reply, sender);
        let note = format!("Intent: {}, Tone: {}", state.intent, state.tone.as_str());
        state.rationale = if state.rationale.is_empty() {
            note
        } else {
            format!("{} | {note}", state.rationale)
        };
        Ok(state)
    }

    async fn record_learning(
        &self,
        mut state: ConversationState,
    ) -> Result<ConversationState, PipelineError> {
        if state.intent == Intent::Task && state.messages.len() > 1 {
            state.observations.push(Observation::new(
                "behavior",
                "Captures tasks in the middle of conversations",
                0.3,
            ));
        }

        let mut interaction = Interaction::new(
            &state.session_id,
            state.intent.as_str(),
            state.latest_sender_text().unwrap_or_default(),
            &state.response,
        );
        interaction.observations = state.observations.clone();
        state.interaction_id = Some(interaction.id);

        let patterns = &self.deps.patterns;
        patterns.observe_interaction(&interaction).await?;
        patterns.record_interaction(interaction).await;
        Ok(state)
    }

    /// Close a session and summarize it.
    pub async fn end_session(&self, session_id: &str) -> Result<SessionSummary, PipelineError> {
        let session = self
            .sessions
            .lock()
            .await
            .remove(session_id)
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))?;
        let session = session.lock().await;

        let summary = SessionSummary {
            session_id: session_id.to_string(),
            message_count: session.state.messages.len(),
            actions_taken: session.ledger.actions_taken,
            observations: session.ledger.observations,
            spawned_agents: session.ledger.spawned_agents.clone(),
        };
        info!(
            session = %session_id,
            messages = summary.message_count,
            actions = summary.actions_taken,
            "Session ended"
        );
        Ok(summary)
    }

    /// Copy of a session's state after its latest turn.
    pub async fn session_state(&self, session_id: &str) -> Option<ConversationState> {
        let session = self.sessions.lock().await.get(session_id).cloned()?;
        let state = session.lock().await.state.clone();
        Some(state)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

fn redirect(mut state: ConversationState) -> ConversationState {
    state.response = state.redirect.clone().unwrap_or_default();
    state
}

/// `@mentions` and `#tags` in a message.
fn extract_entities(text: &str) -> HashMap<String, Vec<String>> {
    let mut entities: HashMap<String, Vec<String>> = HashMap::new();
    for word in text.split_whitespace() {
        let word = word.trim_end_matches(|c: char| !c.is_alphanumeric());
        let (kind, rest) = if let Some(rest) = word.strip_prefix('@') {
            ("mentions", rest)
        } else if let Some(rest) = word.strip_prefix('#') {
            ("tags", rest)
        } else {
            continue;
        };
        if !rest.is_empty() {
            entities
                .entry(kind.to_string())
                .or_default()
                .push(rest.to_string());
        }
    }
    entities
}
