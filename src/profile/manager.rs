//! ProfileManager: cached single writer over a `ProfileStore`.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ProfileError;

use super::model::{FounderProfile, Goal, ProfileSnapshot};
use super::store::{AccessLogEntry, ProfileStore};

/// Read-mostly cache of the founder profile.
///
/// Updates mutate the cached copy, then persist, then log. There is no
/// rollback: a failed save leaves memory ahead of disk until restart.
pub struct ProfileManager {
    store: Arc<dyn ProfileStore>,
    cached: RwLock<Option<FounderProfile>>,
}

impl ProfileManager {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    async fn log_access(&self, action: &str, details: Option<String>) -> Result<(), ProfileError> {
        self.store
            .append_log(&AccessLogEntry::new(action, details))
            .await?;
        Ok(())
    }

    /// Load the profile (cached after the first call).
    ///
    /// The first run with nothing on disk persists the defaults.
    pub async fn load(&self) -> Result<FounderProfile, ProfileError> {
        if let Some(profile) = self.cached.read().await.as_ref() {
            return Ok(profile.clone());
        }

        let mut cached = self.cached.write().await;
        // Another task may have filled the cache while we waited.
        if let Some(profile) = cached.as_ref() {
            return Ok(profile.clone());
        }

        let profile = match self.store.load().await? {
            Some(profile) => {
                self.log_access("load", Some("Profile loaded from secure storage".into()))
                    .await?;
                profile
            }
            None => {
                let mut profile = FounderProfile::default();
                profile.last_updated = Some(Utc::now());
                self.store.save(&profile).await?;
                self.log_access(
                    "initialize",
                    Some("New profile created with defaults".into()),
                )
                .await?;
                info!("Initialized founder profile with defaults");
                profile
            }
        };

        *cached = Some(profile.clone());
        Ok(profile)
    }

    async fn mutate<F>(&self, action: &str, details: String, f: F) -> Result<(), ProfileError>
    where
        F: FnOnce(&mut FounderProfile) -> Result<(), ProfileError>,
    {
        self.load().await?;
        let snapshot = {
            let mut cached = self.cached.write().await;
            let profile = cached.get_or_insert_with(FounderProfile::default);
            f(profile)?;
            profile.last_updated = Some(Utc::now());
            profile.clone()
        };

        self.store.save(&snapshot).await?;
        self.log_access(action, Some(details)).await?;
        debug!(action, "Founder profile updated");
        Ok(())
    }

    /// Update a single preference by name.
    ///
    /// Unknown keys and ill-typed values are rejected before anything changes.
    pub async fn update_preference(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ProfileError> {
        let invalid = |reason: &str| ProfileError::InvalidPreference {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        // Validate first so an error never leaves a half-applied update.
        enum Update {
            Name(String),
            Pronouns(Vec<String>),
            Style(String),
            WorkHours(Option<String>),
            Focus(u32),
            BreakReminder(bool),
            FocusArea(Option<String>),
            NeverShare(Vec<String>),
        }

        let update = match key {
            "preferred_name" => Update::Name(
                value
                    .as_str()
                    .ok_or_else(|| invalid("expected a string"))?
                    .to_string(),
            ),
            "pronouns" => Update::Pronouns(
                serde_json::from_value(value).map_err(|_| invalid("expected a list of strings"))?,
            ),
            "communication_style" => Update::Style(
                value
                    .as_str()
                    .ok_or_else(|| invalid("expected a string"))?
                    .to_string(),
            ),
            "work_hours_preference" => Update::WorkHours(
                serde_json::from_value(value).map_err(|_| invalid("expected a string or null"))?,
            ),
            "focus_duration_minutes" => {
                let minutes = value
                    .as_u64()
                    .filter(|m| *m > 0 && *m <= u32::MAX as u64)
                    .ok_or_else(|| invalid("expected a positive integer"))?;
                Update::Focus(minutes as u32)
            }
            "break_reminder_enabled" => {
                Update::BreakReminder(value.as_bool().ok_or_else(|| invalid("expected a bool"))?)
            }
            "current_focus_area" => Update::FocusArea(
                serde_json::from_value(value).map_err(|_| invalid("expected a string or null"))?,
            ),
            "never_share_topics" => Update::NeverShare(
                serde_json::from_value(value).map_err(|_| invalid("expected a list of strings"))?,
            ),
            other => return Err(ProfileError::UnknownPreference(other.to_string())),
        };

        self.mutate("update", format!("Updated {key}"), move |p| {
            match update {
                Update::Name(v) => p.preferred_name = v,
                Update::Pronouns(v) => p.pronouns = v,
                Update::Style(v) => p.communication_style = v,
                Update::WorkHours(v) => p.work_hours_preference = v,
                Update::Focus(v) => p.focus_duration_minutes = Some(v),
                Update::BreakReminder(v) => p.break_reminder_enabled = v,
                Update::FocusArea(v) => p.current_focus_area = v,
                Update::NeverShare(v) => p.never_share_topics = v,
            }
            Ok(())
        })
        .await
    }

    /// Add a goal to tracking.
    pub async fn add_goal(&self, title: &str) -> Result<(), ProfileError> {
        let goal = Goal::new(title);
        self.mutate("add_goal", title.to_string(), move |p| {
            p.active_goals.push(goal);
            Ok(())
        })
        .await
    }

    /// Whether `text` avoids every never-share topic.
    pub async fn is_shareable_topic(&self, text: &str) -> Result<bool, ProfileError> {
        Ok(self.load().await?.is_shareable(text))
    }

    /// The prompt-safe view of the profile. Logged as a read.
    pub async fn snapshot(&self) -> Result<ProfileSnapshot, ProfileError> {
        let profile = self.load().await?;
        self.log_access("read", Some("Context snapshot".into())).await?;
        Ok(profile.snapshot())
    }

    /// The audit trail, oldest first.
    pub async fn access_log(&self) -> Result<Vec<AccessLogEntry>, ProfileError> {
        Ok(self.store.read_log().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::store::FileProfileStore;

    async fn manager(dir: &std::path::Path) -> ProfileManager {
        let store = FileProfileStore::open(dir).await.unwrap();
        ProfileManager::new(Arc::new(store))
    }

    #[tokio::test]
    async fn first_load_persists_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path()).await;
        let profile = mgr.load().await.unwrap();
        assert_eq!(profile.preferred_name, "the founder");
        assert!(dir.path().join(FileProfileStore::PROFILE_FILE).exists());

        let log = mgr.access_log().await.unwrap();
        assert_eq!(log[0].action, "initialize");
    }

    #[tokio::test]
    async fn second_manager_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mgr = manager(dir.path()).await;
            mgr.update_preference("preferred_name", serde_json::json!("Gray"))
                .await
                .unwrap();
        }
        let mgr = manager(dir.path()).await;
        assert_eq!(mgr.load().await.unwrap().preferred_name, "Gray");
        let actions: Vec<String> = mgr
            .access_log()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["initialize", "update", "load"]);
    }

    #[tokio::test]
    async fn unknown_preference_is_rejected_without_logging() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path()).await;
        mgr.load().await.unwrap();
        let err = mgr
            .update_preference("shoe_size", serde_json::json!(11))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::UnknownPreference(_)));
        assert_eq!(mgr.access_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ill_typed_preference_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path()).await;
        let err = mgr
            .update_preference("focus_duration_minutes", serde_json::json!("long"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::InvalidPreference { .. }));
        assert_eq!(mgr.load().await.unwrap().focus_duration_minutes, None);
    }

    #[tokio::test]
    async fn goals_show_up_in_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path()).await;
        mgr.add_goal("Ship the co-op MVP").await.unwrap();
        let snap = mgr.snapshot().await.unwrap();
        assert_eq!(snap.active_goals, vec!["Ship the co-op MVP".to_string()]);

        let log = mgr.access_log().await.unwrap();
        assert!(log.iter().any(|e| e.action == "add_goal"));
        assert!(log.iter().any(|e| e.action == "read"));
    }

    #[tokio::test]
    async fn shareable_uses_profile_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path()).await;
        assert!(!mgr.is_shareable_topic("sector7 status").await.unwrap());
        mgr.update_preference("never_share_topics", serde_json::json!([]))
            .await
            .unwrap();
        assert!(mgr.is_shareable_topic("sector7 status").await.unwrap());
    }
}
