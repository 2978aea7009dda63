//! Slash commands handled before the pipeline.
//!
//! Only authorized senders reach this module; the router applies the access
//! gate first.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actions::{ActionDispatcher, AgentKind, agent_name_for};
use crate::config::AuroraConfig;
use crate::error::Result;
use crate::learning::{Feedback, PatternStore};
use crate::pipeline::Orchestrator;
use crate::storage;
use crate::wellbeing::WellbeingMonitor;

const HELP: &str = "**Aurora Forester Commands**

**/status** - Current status
**/agents** - List spawned agents
**/patterns** - What I've learned so far
**/capture [idea]** - Capture an idea to the Think Tank
**/spawn [domain]** - Spawn a new agent for a domain
**/focus** - Start a focus session
**/break** - Log a break
**/meal** - Log a meal
**/feedback [positive|negative]** - Rate my last reply
**/help** - Show this help

Or just talk to me naturally.";

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Agents,
    Patterns,
    Help,
    Capture(String),
    Spawn(String),
    Focus,
    Break,
    Meal,
    Feedback(Feedback),
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse `text` as a command. `None` if it is not one.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return None;
        }
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        let head = head.to_lowercase();

        let command = match (head.as_str(), rest.is_empty()) {
            ("/status", true) => Self::Status,
            ("/agents", true) => Self::Agents,
            ("/patterns", true) => Self::Patterns,
            ("/help" | "/?", true) => Self::Help,
            ("/focus", true) => Self::Focus,
            ("/break", true) => Self::Break,
            ("/meal", true) => Self::Meal,
            ("/quit" | "/exit", true) => Self::Quit,
            ("/capture", false) => Self::Capture(rest.to_string()),
            ("/spawn", false) => Self::Spawn(rest.to_string()),
            ("/feedback", false) => match rest.parse() {
                Ok(feedback) => Self::Feedback(feedback),
                Err(_) => Self::Unknown(trimmed.to_string()),
            },
            _ => Self::Unknown(trimmed.to_string()),
        };
        Some(command)
    }
}

/// One Think Tank capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaCapture {
    pub idea: String,
    pub session_id: String,
    pub captured_at: DateTime<Utc>,
}

/// Executes commands against the running assistant.
pub struct CommandHandler {
    config: Arc<AuroraConfig>,
    model: String,
    orchestrator: Arc<Orchestrator>,
    patterns: Arc<PatternStore>,
    wellbeing: Arc<WellbeingMonitor>,
    dispatcher: Arc<ActionDispatcher>,
}

impl CommandHandler {
    pub const IDEAS_FILE: &'static str = "think_tank.jsonl";

    pub fn new(
        config: Arc<AuroraConfig>,
        model: impl Into<String>,
        orchestrator: Arc<Orchestrator>,
        patterns: Arc<PatternStore>,
        wellbeing: Arc<WellbeingMonitor>,
        dispatcher: Arc<ActionDispatcher>,
    ) -> Self {
        Self {
            config,
            model: model.into(),
            orchestrator,
            patterns,
            wellbeing,
            dispatcher,
        }
    }

    fn ideas_path(&self) -> PathBuf {
        self.config.data_dir.join(Self::IDEAS_FILE)
    }

    /// Run `command` for `session_id` and return the reply text.
    pub async fn execute(&self, command: Command, session_id: &str) -> Result<String> {
        let reply = match command {
            Command::Status => self.status().await,
            Command::Agents => self.agents().await,
            Command::Patterns => self.patterns().await,
            Command::Help => HELP.to_string(),
            Command::Capture(idea) => self.capture(&idea, session_id).await?,
            Command::Spawn(domain) => self.spawn(&domain).await,
            Command::Focus => {
                self.wellbeing.record_focus_start().await;
                "Focus session started. I'll nudge you when it's time for a break.".to_string()
            }
            Command::Break => {
                self.wellbeing.record_break().await;
                let summary = self.wellbeing.daily_summary().await;
                format!("Break logged ({} today). Enjoy it.", summary.breaks_taken)
            }
            Command::Meal => {
                self.wellbeing.record_meal().await;
                "Meal logged. I'll hold off on food reminders for a while.".to_string()
            }
            Command::Feedback(feedback) => self.feedback(feedback, session_id).await?,
            Command::Quit => "Goodbye.".to_string(),
            Command::Unknown(text) => {
                format!("Unknown command: {text}. Type /help for available commands.")
            }
        };
        Ok(reply)
    }

    async fn status(&self) -> String {
        let agents = self.dispatcher.agents().active().await.len();
        let tasks = self.dispatcher.tasks().open_tasks().await.len();
        let sessions = self.orchestrator.active_sessions().await;
        let wellbeing = self.wellbeing.daily_summary().await;
        let gate = self.patterns.gate();
        let learning = match (gate.learning_enabled, gate.feedback_required) {
            (false, _) => "Disabled",
            (true, true) => "Enabled (feedback required)",
            (true, false) => "Enabled",
        };

        format!(
            "**{} Status**\n\n\
             **Model:** {}\n\
             **Spawned Agents:** {agents}\n\
             **Open Tasks:** {tasks}\n\
             **Active Sessions:** {sessions}\n\
             **Breaks Today:** {}\n\
             **In Focus Session:** {}\n\
             **Learning:** {learning}",
            self.config.agent_name,
            self.model,
            wellbeing.breaks_taken,
            if wellbeing.in_focus_session { "Yes" } else { "No" },
        )
    }

    async fn agents(&self) -> String {
        let agents = self.dispatcher.agents().active().await;
        if agents.is_empty() {
            return "No agents spawned yet. Use `/spawn [domain]` to create one.".to_string();
        }
        let list = agents
            .iter()
            .map(|a| format!("- {} ({}, {})", a.name, a.kind, a.id))
            .collect::<Vec<_>>()
            .join("\n");
        format!("**Spawned Agents:**\n{list}")
    }

    async fn patterns(&self) -> String {
        let summary = self.patterns.domain_summary().await;
        let pending = self.patterns.pending_observations().await.len();
        let mut out = String::from("**Learned Patterns:**\n");
        for (domain, count) in summary {
            out.push_str(&format!("- {}: {count}\n", domain.title()));
        }
        out.push_str(&format!("\nObservations awaiting review: {pending}"));
        out
    }

    async fn capture(&self, idea: &str, session_id: &str) -> Result<String> {
        let capture = IdeaCapture {
            idea: idea.to_string(),
            session_id: session_id.to_string(),
            captured_at: Utc::now(),
        };
        storage::ensure_private_dir(&self.config.data_dir).await?;
        storage::append_json_line(&self.ideas_path(), &capture).await?;
        info!(session = %session_id, len = idea.len(), "Captured to think tank");

        Ok(format!(
            "**Captured to Think Tank**\n\nIdea: {idea}\nTimestamp: {}\n\n\
             I'll categorize and organize this. Would you like me to score it now?",
            capture.captured_at.format("%Y-%m-%d %H:%M")
        ))
    }

    async fn spawn(&self, domain: &str) -> String {
        let kind = AgentKind::infer(domain);
        let agent = self
            .dispatcher
            .agents()
            .spawn(kind, &agent_name_for(domain), domain)
            .await;
        format!(
            "**Agent Spawned**\n\nName: {}\nDomain: {domain}\nType: {kind}\nStatus: Active\n\n\
             The agent is now part of the system and will report back to me.",
            agent.name
        )
    }

    async fn feedback(&self, feedback: Feedback, session_id: &str) -> Result<String> {
        let last = self
            .orchestrator
            .session_state(session_id)
            .await
            .and_then(|state| state.interaction_id);
        let Some(interaction_id) = last else {
            return Ok("There's no recent reply of mine to rate yet.".to_string());
        };
        if self.patterns.provide_feedback(interaction_id, feedback).await? {
            Ok("Thanks, noted.".to_string())
        } else {
            Ok("That reply is too old for me to learn from now.".to_string())
        }
    }
}
