//! Bounded, domain-partitioned pattern store.
//!
//! Each allow-listed domain lives in its own `{domain}_patterns.jsonl` file,
//! read once at open and rewritten in full on every write. A per-domain
//! mutex keeps at most one write in flight per domain.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::storage;

/// Interactions kept in memory so feedback can arrive after the turn.
const RECENT_INTERACTIONS: usize = 100;

/// Patterns listed per domain in the relevance digest.
const DIGEST_PER_DOMAIN: usize = 3;

/// Confidence given to new patterns when none is supplied.
pub const DEFAULT_PATTERN_CONFIDENCE: f32 = 0.5;

/// The closed set of domains the store may learn about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningDomain {
    Decision,
    Time,
    Project,
    Communication,
    Principle,
}

impl LearningDomain {
    pub const ALL: [LearningDomain; 5] = [
        Self::Decision,
        Self::Time,
        Self::Project,
        Self::Communication,
        Self::Principle,
    ];

    /// Parse an allow-listed domain name. Anything else is `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "decision" => Some(Self::Decision),
            "time" => Some(Self::Time),
            "project" => Some(Self::Project),
            "communication" => Some(Self::Communication),
            "principle" => Some(Self::Principle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Time => "time",
            Self::Project => "project",
            Self::Communication => "communication",
            Self::Principle => "principle",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Decision => "Decision",
            Self::Time => "Time",
            Self::Project => "Project",
            Self::Communication => "Communication",
            Self::Principle => "Principle",
        }
    }

    fn file_name(&self) -> String {
        format!("{}_patterns.jsonl", self.as_str())
    }
}

impl std::fmt::Display for LearningDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable, domain-scoped unit of learning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub domain: LearningDomain,
    pub pattern_type: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_count: u32,
}

/// Ephemeral per-turn signal. Only an explicit `promote` turns one into a
/// [`Pattern`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub observation_type: String,
    pub content: String,
    pub confidence: f32,
    #[serde(default)]
    pub validated: bool,
}

impl Observation {
    pub fn new(observation_type: impl Into<String>, content: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            observation_type: observation_type.into(),
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            validated: false,
        }
    }
}

/// Explicit feedback on an assistant reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
    Neutral,
}

impl std::str::FromStr for Feedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "+" | "up" => Ok(Self::Positive),
            "negative" | "-" | "down" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            other => Err(format!("unknown feedback: {other}")),
        }
    }
}

/// One completed exchange, as seen by the learning path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub session_id: String,
    pub intent: String,
    pub user_message: String,
    pub assistant_response: String,
    #[serde(default)]
    pub observations: Vec<Observation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    pub fn new(
        session_id: impl Into<String>,
        intent: impl Into<String>,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            intent: intent.into(),
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            observations: Vec::new(),
            feedback: None,
            timestamp: Utc::now(),
        }
    }
}

/// Learning switches, lifted from config.
#[derive(Debug, Clone, Copy)]
pub struct LearningGate {
    pub learning_enabled: bool,
    pub feedback_required: bool,
}

impl LearningGate {
    /// Learning on, and either no feedback required or explicit positive feedback.
    pub fn admits(&self, interaction: &Interaction) -> bool {
        self.learning_enabled
            && (!self.feedback_required || interaction.feedback == Some(Feedback::Positive))
    }
}

pub struct PatternStore {
    dir: PathBuf,
    gate: LearningGate,
    domains: HashMap<LearningDomain, Mutex<Vec<Pattern>>>,
    recent: Mutex<VecDeque<Interaction>>,
    pending: Mutex<Vec<Observation>>,
}

impl PatternStore {
    pub const OBSERVATIONS_FILE: &'static str = "observations.jsonl";

    /// Open the store under `dir`, loading every domain file and creating
    /// empty ones for domains not yet on disk.
    pub async fn open(dir: impl Into<PathBuf>, gate: LearningGate) -> Result<Self, StoreError> {
        let dir = dir.into();
        storage::ensure_private_dir(&dir).await?;

        let mut domains = HashMap::new();
        for domain in LearningDomain::ALL {
            let path = dir.join(domain.file_name());
            if !tokio::fs::try_exists(&path).await? {
                storage::write_json_lines::<Pattern>(&path, &[]).await?;
            }
            let patterns: Vec<Pattern> = storage::read_json_lines(&path).await?;
            debug!(%domain, count = patterns.len(), "Loaded pattern domain");
            domains.insert(domain, Mutex::new(patterns));
        }

        let pending = storage::read_json_lines(&dir.join(Self::OBSERVATIONS_FILE)).await?;

        info!(dir = %dir.display(), "Pattern store ready");
        Ok(Self {
            dir,
            gate,
            domains,
            recent: Mutex::new(VecDeque::new()),
            pending: Mutex::new(pending),
        })
    }

    pub fn gate(&self) -> LearningGate {
        self.gate
    }

    fn domain(&self, domain: LearningDomain) -> &Mutex<Vec<Pattern>> {
        // Every variant is inserted in `open`.
        &self.domains[&domain]
    }

    fn domain_path(&self, domain: LearningDomain) -> PathBuf {
        self.dir.join(domain.file_name())
    }

    /// Add a pattern to an allow-listed domain.
    ///
    /// A domain outside the allow-list is refused with `Ok(None)` and a log
    /// line; nothing on disk changes.
    pub async fn add_pattern(
        &self,
        domain: &str,
        pattern_type: &str,
        description: &str,
        examples: Vec<String>,
        confidence: Option<f32>,
    ) -> Result<Option<Pattern>, StoreError> {
        let Some(domain) = LearningDomain::parse(domain) else {
            warn!(domain, "Refused pattern for domain outside the allow-list");
            return Ok(None);
        };

        let mut patterns = self.domain(domain).lock().await;
        let now = Utc::now();
        let pattern = Pattern {
            id: format!("{}_{}_{}", domain, patterns.len() + 1, now.format("%Y%m%d")),
            domain,
            pattern_type: pattern_type.to_string(),
            description: description.to_string(),
            examples,
            confidence: confidence
                .unwrap_or(DEFAULT_PATTERN_CONFIDENCE)
                .clamp(0.0, 1.0),
            created_at: now,
            last_used: None,
            use_count: 0,
        };

        patterns.push(pattern.clone());
        if let Err(e) = storage::write_json_lines(&self.domain_path(domain), &patterns).await {
            patterns.pop();
            return Err(e);
        }

        info!(id = %pattern.id, %domain, "Added pattern");
        Ok(Some(pattern))
    }

    /// Remember an interaction so feedback can be attached later.
    /// Memory only; nothing is learned from it here.
    pub async fn record_interaction(&self, interaction: Interaction) {
        let mut recent = self.recent.lock().await;
        if recent.len() == RECENT_INTERACTIONS {
            recent.pop_front();
        }
        recent.push_back(interaction);
    }

    /// Queue an interaction's observations for review, if the gate admits it.
    ///
    /// Returns whether anything was recorded. Never writes a pattern.
    pub async fn observe_interaction(&self, interaction: &Interaction) -> Result<bool, StoreError> {
        if !self.gate.admits(interaction) {
            debug!(interaction = %interaction.id, "Learning gate closed");
            return Ok(false);
        }
        if interaction.observations.is_empty() {
            return Ok(false);
        }

        let mut pending = self.pending.lock().await;
        let path = self.dir.join(Self::OBSERVATIONS_FILE);
        for observation in &interaction.observations {
            let mut observation = observation.clone();
            observation.validated = false;
            storage::append_json_line(&path, &observation).await?;
            pending.push(observation);
        }
        debug!(
            interaction = %interaction.id,
            count = interaction.observations.len(),
            "Queued observations"
        );
        Ok(true)
    }

    /// Attach feedback to a remembered interaction, then re-run the gate.
    ///
    /// Returns `false` when the interaction is no longer remembered.
    pub async fn provide_feedback(
        &self,
        interaction_id: Uuid,
        feedback: Feedback,
    ) -> Result<bool, StoreError> {
        let interaction = {
            let mut recent = self.recent.lock().await;
            let Some(interaction) = recent.iter_mut().find(|i| i.id == interaction_id) else {
                return Ok(false);
            };
            let first_positive =
                feedback == Feedback::Positive && interaction.feedback != Some(Feedback::Positive);
            interaction.feedback = Some(feedback);
            first_positive.then(|| interaction.clone())
        };

        info!(interaction = %interaction_id, ?feedback, "Feedback recorded");
        if let Some(interaction) = interaction
            && self.gate.feedback_required
        {
            self.observe_interaction(&interaction).await?;
        }
        Ok(true)
    }

    /// Observations awaiting explicit validation.
    pub async fn pending_observations(&self) -> Vec<Observation> {
        self.pending.lock().await.clone()
    }

    /// Promote a pending observation into a pattern.
    ///
    /// `Ok(None)` if the observation is unknown or the domain is refused; in
    /// both cases the observation stays pending.
    pub async fn promote(
        &self,
        observation_id: Uuid,
        domain: &str,
        pattern_type: &str,
    ) -> Result<Option<Pattern>, StoreError> {
        let mut pending = self.pending.lock().await;
        let Some(pos) = pending.iter().position(|o| o.id == observation_id) else {
            return Ok(None);
        };

        let observation = pending[pos].clone();
        let Some(pattern) = self
            .add_pattern(
                domain,
                pattern_type,
                &observation.content,
                Vec::new(),
                Some(observation.confidence),
            )
            .await?
        else {
            return Ok(None);
        };

        pending.remove(pos);
        storage::write_json_lines(&self.dir.join(Self::OBSERVATIONS_FILE), &pending).await?;
        debug!(observation = %observation_id, pattern = %pattern.id, "Promoted observation");
        Ok(Some(pattern))
    }

    /// Bump use count and last-used time. `false` if the id is unknown.
    pub async fn record_use(&self, pattern_id: &str) -> Result<bool, StoreError> {
        let Some(domain) = pattern_id
            .split('_')
            .next()
            .and_then(LearningDomain::parse)
        else {
            return Ok(false);
        };

        let mut patterns = self.domain(domain).lock().await;
        let Some(pattern) = patterns.iter_mut().find(|p| p.id == pattern_id) else {
            return Ok(false);
        };
        pattern.use_count += 1;
        pattern.last_used = Some(Utc::now());
        storage::write_json_lines(&self.domain_path(domain), &patterns).await?;
        Ok(true)
    }

    /// Coarse digest of recent patterns for prompt context.
    ///
    /// No semantic matching: `_query` is accepted for interface stability and
    /// the digest is the newest few patterns per domain. Empty string when
    /// nothing has been learned.
    pub async fn get_relevant_patterns(&self, _query: &str) -> String {
        let mut lines = Vec::new();
        for domain in LearningDomain::ALL {
            let patterns = self.domain(domain).lock().await;
            if patterns.is_empty() {
                continue;
            }
            lines.push(format!("\n**{} Patterns:**", domain.title()));
            for p in patterns.iter().rev().take(DIGEST_PER_DOMAIN) {
                lines.push(format!(
                    "- {} (confidence: {:.0}%)",
                    p.description,
                    p.confidence * 100.0
                ));
            }
        }
        lines.join("\n")
    }

    /// Pattern count per domain.
    pub async fn domain_summary(&self) -> BTreeMap<LearningDomain, usize> {
        let mut summary = BTreeMap::new();
        for domain in LearningDomain::ALL {
            summary.insert(domain, self.domain(domain).lock().await.len());
        }
        summary
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN_GATE: LearningGate = LearningGate {
        learning_enabled: true,
        feedback_required: false,
    };

    const FEEDBACK_GATE: LearningGate = LearningGate {
        learning_enabled: true,
        feedback_required: true,
    };

    fn line_counts(dir: &Path) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with("_patterns.jsonl"))
            .map(|p| {
                let n = std::fs::read_to_string(&p).unwrap().lines().count();
                (p.file_name().unwrap().to_string_lossy().into_owned(), n)
            })
            .collect();
        counts.sort();
        counts
    }

    fn interaction_with_observation() -> Interaction {
        let mut i = Interaction::new("s1", "task", "add a task", "Done.");
        i.observations
            .push(Observation::new("behavior", "Prefers quick task capture", 0.3));
        i
    }

    #[tokio::test]
    async fn open_creates_every_domain_file() {
        let dir = tempfile::tempdir().unwrap();
        let _store = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        for domain in LearningDomain::ALL {
            assert!(dir.path().join(domain.file_name()).exists());
        }
    }

    #[tokio::test]
    async fn add_pattern_assigns_domain_scoped_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        let p = store
            .add_pattern("decision", "heuristic", "Sleeps on big calls", vec![], None)
            .await
            .unwrap()
            .unwrap();
        assert!(p.id.starts_with("decision_1_"));
        assert_eq!(p.confidence, DEFAULT_PATTERN_CONFIDENCE);

        let reopened = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        assert_eq!(reopened.domain_summary().await[&LearningDomain::Decision], 1);
    }

    #[tokio::test]
    async fn disallowed_domain_is_refused_without_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        store
            .add_pattern("time", "rhythm", "Deep work before noon", vec![], Some(0.7))
            .await
            .unwrap();
        let before = line_counts(dir.path());

        let refused = store
            .add_pattern("finance", "budget", "Spends on tools", vec![], None)
            .await
            .unwrap();
        assert!(refused.is_none());
        assert_eq!(line_counts(dir.path()), before);
        assert!(!dir.path().join("finance_patterns.jsonl").exists());
    }

    #[tokio::test]
    async fn feedback_gate_blocks_unrated_interactions() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), FEEDBACK_GATE).await.unwrap();
        let before = line_counts(dir.path());
        for _ in 0..3 {
            let recorded = store
                .observe_interaction(&interaction_with_observation())
                .await
                .unwrap();
            assert!(!recorded);
        }
        assert_eq!(line_counts(dir.path()), before);
        assert!(store.pending_observations().await.is_empty());
    }

    #[tokio::test]
    async fn learning_disabled_blocks_even_positive_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let gate = LearningGate {
            learning_enabled: false,
            feedback_required: false,
        };
        let store = PatternStore::open(dir.path(), gate).await.unwrap();
        let mut i = interaction_with_observation();
        i.feedback = Some(Feedback::Positive);
        assert!(!store.observe_interaction(&i).await.unwrap());
    }

    #[tokio::test]
    async fn positive_feedback_queues_but_never_promotes() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), FEEDBACK_GATE).await.unwrap();
        let interaction = interaction_with_observation();
        let id = interaction.id;
        store.record_interaction(interaction).await;

        assert!(store.provide_feedback(id, Feedback::Positive).await.unwrap());
        let pending = store.pending_observations().await;
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].validated);
        assert!(store.domain_summary().await.values().all(|n| *n == 0));
    }

    #[tokio::test]
    async fn negative_feedback_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), FEEDBACK_GATE).await.unwrap();
        let interaction = interaction_with_observation();
        let id = interaction.id;
        store.record_interaction(interaction).await;

        assert!(store.provide_feedback(id, Feedback::Negative).await.unwrap());
        assert!(store.pending_observations().await.is_empty());
        assert!(!store.provide_feedback(Uuid::new_v4(), Feedback::Positive).await.unwrap());
    }

    #[tokio::test]
    async fn promote_moves_observation_into_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        store
            .observe_interaction(&interaction_with_observation())
            .await
            .unwrap();
        let obs = store.pending_observations().await.remove(0);

        assert!(store.promote(obs.id, "finance", "x").await.unwrap().is_none());
        assert_eq!(store.pending_observations().await.len(), 1);

        let pattern = store
            .promote(obs.id, "project", "workflow")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pattern.description, "Prefers quick task capture");
        assert!(store.pending_observations().await.is_empty());
    }

    #[tokio::test]
    async fn digest_lists_newest_three_per_domain() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        assert_eq!(store.get_relevant_patterns("anything").await, "");

        for n in 1..=4 {
            store
                .add_pattern("communication", "style", &format!("note {n}"), vec![], Some(0.8))
                .await
                .unwrap();
        }
        let digest = store.get_relevant_patterns("anything").await;
        assert!(digest.contains("**Communication Patterns:**"));
        assert!(digest.contains("- note 4 (confidence: 80%)"));
        assert!(digest.contains("note 2"));
        assert!(!digest.contains("note 1"));
    }

    #[tokio::test]
    async fn record_use_bumps_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        let p = store
            .add_pattern("principle", "value", "People over process", vec![], None)
            .await
            .unwrap()
            .unwrap();
        assert!(store.record_use(&p.id).await.unwrap());
        assert!(!store.record_use("principle_99_20200101").await.unwrap());

        let reopened = PatternStore::open(dir.path(), OPEN_GATE).await.unwrap();
        let digest = reopened.get_relevant_patterns("").await;
        assert!(digest.contains("People over process"));
    }
}
