//! In-memory task board.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Leading request phrasing stripped off to get a task title.
static TASK_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:please\s+)?(?:can you\s+|could you\s+)?(?:(?:create|add|make)\s+(?:a\s+|an\s+)?(?:new\s+)?(?:task|todo|to-do|reminder)\s*(?:(?:to|for)\b|:)?\s*|remind me\s+(?:to\s+)?|todo:?\s*|task:?\s*)",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    /// Session the task was captured in.
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: TaskStatus::Open,
            session_id: session_id.into(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Pull a task title out of a request like "create a task to water the plants".
///
/// Falls back to the whole message when no request phrasing is found.
pub fn extract_task_title(text: &str) -> String {
    let stripped = TASK_PREFIX.replace(text, "");
    let title = stripped
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim();
    if title.is_empty() {
        text.trim().to_string()
    } else {
        title.to_string()
    }
}

/// Tasks captured from conversation.
#[derive(Default)]
pub struct TaskBoard {
    tasks: RwLock<Vec<Task>>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, title: impl Into<String>, session_id: &str) -> Task {
        let task = Task::new(title, session_id);
        self.tasks.write().await.push(task.clone());
        task
    }

    pub async fn open_tasks(&self) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.status == TaskStatus::Open)
            .cloned()
            .collect()
    }

    /// Mark a task done. `false` if the id is unknown or already done.
    pub async fn complete(&self, id: Uuid) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks
            .iter_mut()
            .find(|t| t.id == id && t.status == TaskStatus::Open)
        {
            Some(task) => {
                task.status = TaskStatus::Done;
                task.completed_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
