//! Side effects for action intents: tasks, workflow requests, helper agents.

pub mod agents;
pub mod dispatcher;
pub mod tasks;

pub use agents::{AgentKind, AgentRegistry, AgentStatus, SpawnedAgent, agent_name_for};
pub use dispatcher::{ActionDispatcher, Dispatched, WorkflowRequest};
pub use tasks::{Task, TaskBoard, TaskStatus, extract_task_title};
