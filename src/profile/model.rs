//! Founder profile data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub title: String,
    #[serde(default = "default_goal_status")]
    pub status: String,
    pub added_at: DateTime<Utc>,
}

fn default_goal_status() -> String {
    "active".to_string()
}

impl Goal {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: default_goal_status(),
            added_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Persisted founder profile.
///
/// Stored as JSON in `founder_context.json`. Updated only through explicit
/// `ProfileManager` calls, never inferred from conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FounderProfile {
    #[serde(default = "default_name")]
    pub preferred_name: String,
    #[serde(default = "default_pronouns")]
    pub pronouns: Vec<String>,
    #[serde(default = "default_style")]
    pub communication_style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_hours_preference: Option<String>,
    /// Unset means the configured default applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_duration_minutes: Option<u32>,
    #[serde(default = "default_true")]
    pub break_reminder_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_focus_area: Option<String>,
    #[serde(default)]
    pub never_share_topics: Vec<String>,
    #[serde(default)]
    pub active_goals: Vec<Goal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

fn default_name() -> String {
    "the founder".to_string()
}

fn default_pronouns() -> Vec<String> {
    vec!["they/them".to_string()]
}

fn default_style() -> String {
    "direct, warm, collaborative".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for FounderProfile {
    fn default() -> Self {
        Self {
            preferred_name: default_name(),
            pronouns: default_pronouns(),
            communication_style: default_style(),
            work_hours_preference: None,
            focus_duration_minutes: None,
            break_reminder_enabled: true,
            current_focus_area: None,
            never_share_topics: vec![
                "sector7".to_string(),
                "personal_projects".to_string(),
                "private_channels".to_string(),
                "financial_details".to_string(),
                "health_specifics".to_string(),
            ],
            active_goals: Vec::new(),
            last_updated: None,
        }
    }
}

impl FounderProfile {
    /// Whether `text` avoids every never-share topic.
    ///
    /// Topics are stored snake_case; both `financial_details` and
    /// `financial details` count as a hit.
    pub fn is_shareable(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        !self.never_share_topics.iter().any(|topic| {
            let topic = topic.to_lowercase();
            lower.contains(&topic) || lower.contains(&topic.replace('_', " "))
        })
    }

    /// The subset of the profile that may enter a prompt.
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            preferred_name: self.preferred_name.clone(),
            communication_style: self.communication_style.clone(),
            current_focus: self.current_focus_area.clone(),
            active_goals: self
                .active_goals
                .iter()
                .filter(|g| g.is_active())
                .map(|g| g.title.clone())
                .collect(),
        }
    }
}

/// Redacted profile view carried in conversation state.
///
/// Excludes the never-share list and anything not needed to personalize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub preferred_name: String,
    pub communication_style: String,
    pub current_focus: Option<String>,
    pub active_goals: Vec<String>,
}

impl ProfileSnapshot {
    /// Render as a markdown section for prompt injection.
    pub fn to_prompt_section(&self) -> String {
        let mut parts = vec![format!("**About {}:**", self.preferred_name)];
        parts.push(format!("- Communication style: {}", self.communication_style));
        if let Some(ref focus) = self.current_focus {
            parts.push(format!("- Current focus: {}", focus));
        }
        if !self.active_goals.is_empty() {
            parts.push(format!("- Active goals: {}", self.active_goals.join(", ")));
        }
        parts.join("\n")
    }
}
