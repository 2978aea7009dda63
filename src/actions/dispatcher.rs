//! Executes the side effects behind action intents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::pipeline::intent::Intent;
use crate::pipeline::types::{Action, ActionType};

use super::agents::{AgentKind, AgentRegistry, agent_name_for};
use super::tasks::{TaskBoard, extract_task_title};

/// A workflow request captured for later build-out.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRequest {
    pub description: String,
    pub session_id: String,
    pub requested_at: DateTime<Utc>,
}

/// What one dispatch produced.
#[derive(Debug, Default)]
pub struct Dispatched {
    pub actions: Vec<Action>,
    pub spawned_agents: Vec<String>,
}

pub struct ActionDispatcher {
    tasks: Arc<TaskBoard>,
    agents: Arc<AgentRegistry>,
    workflows: RwLock<Vec<WorkflowRequest>>,
}

impl ActionDispatcher {
    pub fn new(tasks: Arc<TaskBoard>, agents: Arc<AgentRegistry>) -> Self {
        Self {
            tasks,
            agents,
            workflows: RwLock::new(Vec::new()),
        }
    }

    pub fn tasks(&self) -> &Arc<TaskBoard> {
        &self.tasks
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    pub async fn workflow_requests(&self) -> Vec<WorkflowRequest> {
        self.workflows.read().await.clone()
    }

    /// Run the action for `intent`. Non-action intents dispatch nothing.
    pub async fn dispatch(&self, intent: Intent, message: &str, session_id: &str) -> Dispatched {
        let mut out = Dispatched::default();
        match intent {
            Intent::Task => {
                let title = extract_task_title(message);
                let task = self.tasks.add(title, session_id).await;
                info!(task = %task.id, session = %session_id, "Task captured");
                out.actions.push(Action {
                    action_type: ActionType::TaskOperation,
                    description: format!("Add task: {}", task.title),
                    result: Some(format!("Added \"{}\" to your tasks.", task.title)),
                    success: true,
                });
            }
            Intent::Workflow => {
                self.workflows.write().await.push(WorkflowRequest {
                    description: message.to_string(),
                    session_id: session_id.to_string(),
                    requested_at: Utc::now(),
                });
                info!(session = %session_id, "Workflow request recorded");
                out.actions.push(Action {
                    action_type: ActionType::WorkflowOperation,
                    description: "Record workflow request".to_string(),
                    result: Some("Workflow request noted for build-out.".to_string()),
                    success: true,
                });
            }
            Intent::AgentSpawn => {
                let kind = AgentKind::infer(message);
                let agent = self
                    .agents
                    .spawn(kind, &agent_name_for(kind.as_str()), message)
                    .await;
                out.actions.push(Action {
                    action_type: ActionType::SpawnAgent,
                    description: format!("Spawn {kind} agent"),
                    result: Some(format!("Spawned {} ({}).", agent.name, agent.id)),
                    success: true,
                });
                out.spawned_agents.push(agent.id);
            }
            _ => {}
        }
        out
    }
}
