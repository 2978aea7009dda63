//! Registry of spawned helper agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Research,
    Workflow,
    Monitor,
    Bmad,
    Specialist,
    Task,
}

impl AgentKind {
    /// Infer the kind of helper a request is asking for.
    pub fn infer(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has(&["research", "investigate", "look into"]) {
            Self::Research
        } else if has(&["workflow", "automate", "n8n"]) {
            Self::Workflow
        } else if has(&["monitor", "watch", "track"]) {
            Self::Monitor
        } else if has(&["bmad"]) {
            Self::Bmad
        } else if has(&["specialist", "expert"]) {
            Self::Specialist
        } else {
            Self::Task
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Workflow => "workflow",
            Self::Monitor => "monitor",
            Self::Bmad => "bmad",
            Self::Specialist => "specialist",
            Self::Task => "task",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnedAgent {
    pub id: String,
    pub name: String,
    pub kind: AgentKind,
    pub purpose: String,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
}

/// Agent name for a specialty: "Grant Writing" becomes `grant-writing-agent`.
pub fn agent_name_for(specialty: &str) -> String {
    let slug = specialty
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    format!("{slug}-agent")
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<Vec<SpawnedAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn spawn(&self, kind: AgentKind, name: &str, purpose: &str) -> SpawnedAgent {
        let short = Uuid::new_v4().simple().to_string();
        let agent = SpawnedAgent {
            id: format!("{kind}-{}", &short[..8]),
            name: name.to_string(),
            kind,
            purpose: purpose.to_string(),
            status: AgentStatus::Active,
            created_at: Utc::now(),
        };
        info!(id = %agent.id, %kind, name = %agent.name, "Spawned agent");
        self.agents.write().await.push(agent.clone());
        agent
    }

    pub async fn active(&self) -> Vec<SpawnedAgent> {
        self.agents
            .read()
            .await
            .iter()
            .filter(|a| a.status == AgentStatus::Active)
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<SpawnedAgent> {
        self.agents.read().await.iter().find(|a| a.id == id).cloned()
    }

    /// Mark an agent finished. `false` if unknown.
    pub async fn complete(&self, id: &str) -> bool {
        let mut agents = self.agents.write().await;
        match agents.iter_mut().find(|a| a.id == id) {
            Some(agent) => {
                agent.status = AgentStatus::Completed;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_kind_from_text() {
        assert_eq!(AgentKind::infer("spawn an agent to research grants"), AgentKind::Research);
        assert_eq!(AgentKind::infer("agent to automate invoicing"), AgentKind::Workflow);
        assert_eq!(AgentKind::infer("monitor the uptime"), AgentKind::Monitor);
        assert_eq!(AgentKind::infer("spawn a helper"), AgentKind::Task);
    }

    #[test]
    fn agent_names_are_slugged() {
        assert_eq!(agent_name_for("Grant Writing"), "grant-writing-agent");
    }

    #[tokio::test]
    async fn spawn_then_complete() {
        let registry = AgentRegistry::new();
        let agent = registry
            .spawn(AgentKind::Research, "research-agent", "grants")
            .await;
        assert!(agent.id.starts_with("research-"));
        assert_eq!(registry.active().await.len(), 1);

        assert!(registry.complete(&agent.id).await);
        assert!(registry.active().await.is_empty());
        assert_eq!(
            registry.get(&agent.id).await.unwrap().status,
            AgentStatus::Completed
        );
        assert!(!registry.complete("nope").await);
    }
}
