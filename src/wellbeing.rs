//! Self-care reminders: focus breaks and meals.
//!
//! `WellbeingState` holds the timestamps and the pure time checks.
//! `WellbeingMonitor` adds the founder's settings and persistence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ProfileError;
use crate::profile::ProfileManager;
use crate::storage;

/// Meal reminder text.
pub const MEAL_REMINDER: &str = "It's been a while since I reminded you about food. Have you \
     eaten recently? Taking care of yourself helps you take care of everything else.";

/// Timestamps behind the reminders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellbeingState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_break: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_break_reminder: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_meal_reminder: Option<DateTime<Utc>>,
    #[serde(default)]
    pub breaks_today: u32,
    #[serde(default)]
    pub focus_sessions_today: u32,
}

impl WellbeingState {
    /// Break check against the focus threshold.
    ///
    /// Level-triggered: while the session runs past the threshold every call
    /// returns the reminder. Only `record_break`/`record_focus_start` clear it.
    pub fn break_reminder(&mut self, now: DateTime<Utc>, threshold: Duration) -> Option<String> {
        let started = self.focus_started?;
        let elapsed = now.signed_duration_since(started).to_std().ok()?;
        if elapsed <= threshold {
            return None;
        }
        self.last_break_reminder = Some(now);
        let minutes = elapsed.as_secs() / 60;
        Some(format!(
            "You've been focused for {minutes} minutes. A short break might help maintain clarity."
        ))
    }

    /// Meal check against a fixed interval.
    ///
    /// Edge-triggered: the first call arms the timer, crossing the interval
    /// returns the reminder and re-arms it, so it fires once per interval.
    pub fn meal_reminder(&mut self, now: DateTime<Utc>, interval: Duration) -> Option<String> {
        let Some(last) = self.last_meal_reminder else {
            self.last_meal_reminder = Some(now);
            return None;
        };
        let elapsed = now.signed_duration_since(last).to_std().ok()?;
        if elapsed < interval {
            return None;
        }
        self.last_meal_reminder = Some(now);
        Some(MEAL_REMINDER.to_string())
    }
}

/// Today's counters, for `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub breaks_taken: u32,
    pub last_break: Option<DateTime<Utc>>,
    pub focus_sessions: u32,
    pub in_focus_session: bool,
}

/// Wellbeing monitor bound to the founder profile.
pub struct WellbeingMonitor {
    profile: Arc<ProfileManager>,
    state: Mutex<WellbeingState>,
    state_file: Option<PathBuf>,
    meal_interval: Duration,
    default_focus_minutes: u32,
}

impl WellbeingMonitor {
    pub const STATE_FILE: &'static str = "wellbeing_state.json";
    pub const DEFAULT_FOCUS_MINUTES: u32 = 90;

    /// In-memory monitor (no persistence).
    pub fn new(profile: Arc<ProfileManager>, meal_interval: Duration) -> Self {
        Self {
            profile,
            state: Mutex::new(WellbeingState::default()),
            state_file: None,
            meal_interval,
            default_focus_minutes: Self::DEFAULT_FOCUS_MINUTES,
        }
    }

    /// Monitor persisting its state under `dir`. Loads any saved state.
    pub async fn open(
        profile: Arc<ProfileManager>,
        meal_interval: Duration,
        dir: impl Into<PathBuf>,
    ) -> Result<Self, ProfileError> {
        let dir = dir.into();
        storage::ensure_private_dir(&dir).await?;
        let state_file = dir.join(Self::STATE_FILE);
        let state: WellbeingState = storage::read_json(&state_file).await?.unwrap_or_default();
        Ok(Self {
            profile,
            state: Mutex::new(state),
            state_file: Some(state_file),
            meal_interval,
            default_focus_minutes: Self::DEFAULT_FOCUS_MINUTES,
        })
    }

    /// Focus threshold used when the profile has none.
    pub fn with_default_focus(mut self, minutes: u32) -> Self {
        self.default_focus_minutes = minutes;
        self
    }

    async fn persist(&self, state: &WellbeingState) {
        if let Some(ref path) = self.state_file
            && let Err(e) = storage::write_json(path, state).await
        {
            // Reminders are advisory; losing a timestamp is not worth failing a turn.
            warn!(error = %e, "Failed to persist wellbeing state");
        }
    }

    pub async fn record_focus_start(&self) {
        self.record_focus_start_at(Utc::now()).await
    }

    pub async fn record_focus_start_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.focus_started = Some(now);
        state.focus_sessions_today += 1;
        self.persist(&state).await;
        debug!("Focus session started");
    }

    /// A break ends the current focus session.
    pub async fn record_break(&self) {
        let mut state = self.state.lock().await;
        state.last_break = Some(Utc::now());
        state.breaks_today += 1;
        state.focus_started = None;
        self.persist(&state).await;
    }

    /// The founder ate; restart the meal interval.
    pub async fn record_meal(&self) {
        let mut state = self.state.lock().await;
        state.last_meal_reminder = Some(Utc::now());
        self.persist(&state).await;
    }

    pub async fn check_break_needed(&self) -> Result<Option<String>, ProfileError> {
        self.check_break_needed_at(Utc::now()).await
    }

    /// Break check using the profile's focus threshold, or the configured
    /// default when the profile has none. Disabled reminders always return
    /// `None`.
    pub async fn check_break_needed_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ProfileError> {
        let profile = self.profile.load().await?;
        if !profile.break_reminder_enabled {
            return Ok(None);
        }
        let minutes = profile
            .focus_duration_minutes
            .unwrap_or(self.default_focus_minutes);
        let threshold = Duration::from_secs(u64::from(minutes) * 60);
        let mut state = self.state.lock().await;
        Ok(state.break_reminder(now, threshold))
    }

    pub async fn check_meal_reminder_at(&self, now: DateTime<Utc>) -> Option<String> {
        let mut state = self.state.lock().await;
        let before = state.last_meal_reminder;
        let reminder = state.meal_reminder(now, self.meal_interval);
        if state.last_meal_reminder != before {
            self.persist(&state).await;
        }
        reminder
    }

    /// Combined check used by the pipeline: break first, then meal.
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<Option<String>, ProfileError> {
        if let Some(reminder) = self.check_break_needed_at(now).await? {
            return Ok(Some(reminder));
        }
        Ok(self.check_meal_reminder_at(now).await)
    }

    pub async fn daily_summary(&self) -> DailySummary {
        let state = self.state.lock().await;
        DailySummary {
            breaks_taken: state.breaks_today,
            last_break: state.last_break,
            focus_sessions: state.focus_sessions_today,
            in_focus_session: state.focus_started.is_some(),
        }
    }
}
