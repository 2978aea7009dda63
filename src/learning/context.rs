//! Context assembly for prompts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::profile::{FounderProfile, ProfileSnapshot};
use crate::security::TopicGuard;

/// Static context documents loaded from the context directory.
const STATIC_FILES: &[(&str, &str)] = &[
    ("founder-profile.md", "Founder Profile"),
    ("partnership-charter.md", "Partnership Charter"),
];

const PROJECT_WORDS: &[&str] = &["project", "hello world", "dao", "ecosystem"];
const DECISION_WORDS: &[&str] = &["decide", "choice", "option", "should i"];
const SELF_CARE_WORDS: &[&str] = &["tired", "rest", "break", "eat", "food", "meal"];

const PROJECT_HINT: &str = "**Project Context:**\n\
- Hello World Co-Op: cooperative ecosystem\n\
- Otter Camp: gamified funding";

const DECISION_HINT: &str = "**Decision Support:**\n\
- Prefer principles-based decisions\n\
- Does this align with the regenerative vision?\n\
- Does this serve the community?\n\
- Is this sustainable?";

const SELF_CARE_HINT: &str = "**Self-Care Context:**\n\
- Hyperfocus makes it easy to skip meals and breaks\n\
- Gentle reminders help; nagging does not";

/// A reference document retrieved for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
    /// Term overlap with the message, in `[0, 1]`.
    pub relevance: f32,
}

/// Everything the assembler may draw on for one turn.
pub struct AssemblyInput<'a> {
    pub message: &'a str,
    pub profile: &'a FounderProfile,
    pub snapshot: &'a ProfileSnapshot,
    pub documents: &'a [Document],
    pub patterns: &'a str,
}

/// Builds the context block handed to the model.
///
/// Every section is checked against the topic guard and the profile's
/// never-share list; a failing section is dropped whole, never trimmed.
pub struct ContextAssembler {
    guard: TopicGuard,
    max_chars: usize,
    static_docs: Vec<Document>,
    dynamic: RwLock<HashMap<String, String>>,
}

impl ContextAssembler {
    /// Assembler with no static documents.
    pub fn new(guard: TopicGuard, max_chars: usize) -> Self {
        Self {
            guard,
            max_chars,
            static_docs: Vec::new(),
            dynamic: RwLock::new(HashMap::new()),
        }
    }

    /// Load the static context files present in `context_dir`.
    /// Missing or unreadable files are skipped.
    pub async fn open(context_dir: impl Into<PathBuf>, guard: TopicGuard, max_chars: usize) -> Self {
        let dir = context_dir.into();
        let mut assembler = Self::new(guard, max_chars);
        for (file, title) in STATIC_FILES {
            if let Some(doc) = load_static(&dir, file, title).await {
                assembler.static_docs.push(doc);
            }
        }
        info!(
            dir = %dir.display(),
            documents = assembler.static_docs.len(),
            "Context assembler ready"
        );
        assembler
    }

    /// Add or replace session-scoped context.
    pub async fn add_dynamic(&self, key: &str, content: &str) {
        self.dynamic
            .write()
            .await
            .insert(key.to_string(), content.to_string());
        debug!(key, "Dynamic context added");
    }

    /// Reference documents for `message`, most relevant first.
    ///
    /// Documents sharing no content word with the message are skipped.
    /// Documents that touch a protected or never-share topic are withheld.
    pub async fn retrieve(&self, message: &str, profile: &FounderProfile) -> Vec<Document> {
        let dynamic = self.dynamic.read().await;
        let candidates = self.static_docs.iter().cloned().chain(dynamic.iter().map(|(key, text)| {
            Document {
                id: format!("dynamic_{key}"),
                title: key.clone(),
                text: text.clone(),
                relevance: 0.0,
            }
        }));

        let mut docs: Vec<Document> = candidates
            .filter(|doc| self.admits(&doc.text, profile))
            .map(|mut doc| {
                doc.relevance = relevance(message, &doc.text);
                doc
            })
            .filter(|doc| doc.relevance > 0.0)
            .collect();
        docs.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        docs
    }

    /// Keyword-triggered topical hints for `message`.
    pub fn topical_hints(&self, message: &str) -> Vec<&'static str> {
        let lower = message.to_lowercase();
        let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        let mut hints = Vec::new();
        if hit(PROJECT_WORDS) {
            hints.push(PROJECT_HINT);
        }
        if hit(DECISION_WORDS) {
            hints.push(DECISION_HINT);
        }
        if hit(SELF_CARE_WORDS) {
            hints.push(SELF_CARE_HINT);
        }
        hints
    }

    /// Assemble the guarded, truncated context block.
    pub fn assemble(&self, input: &AssemblyInput<'_>) -> String {
        let mut sections: Vec<String> = vec![input.snapshot.to_prompt_section()];
        sections.extend(self.topical_hints(input.message).into_iter().map(String::from));
        sections.extend(
            input
                .documents
                .iter()
                .map(|doc| format!("**{}:**\n{}", doc.title, doc.text.trim())),
        );
        if !input.patterns.trim().is_empty() {
            sections.push(format!("**Learned Patterns:**{}", input.patterns));
        }

        let total = sections.len();
        let kept: Vec<String> = sections
            .into_iter()
            .filter(|s| self.admits(s, input.profile))
            .collect();
        if kept.len() < total {
            debug!(dropped = total - kept.len(), "Dropped guarded context sections");
        }

        truncate(&kept.join("\n\n"), self.max_chars)
    }

    fn admits(&self, text: &str, profile: &FounderProfile) -> bool {
        !self.guard.contains_protected(text) && profile.is_shareable(text)
    }
}

async fn load_static(dir: &Path, file: &str, title: &str) -> Option<Document> {
    let path = dir.join(file);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => {
            debug!(file, len = text.len(), "Loaded context file");
            Some(Document {
                id: file.trim_end_matches(".md").replace('-', "_"),
                title: title.to_string(),
                text,
                relevance: 0.0,
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(file, error = %e, "Failed to read context file");
            None
        }
    }
}

/// Share of the message's content words that appear in `text`.
fn relevance(message: &str, text: &str) -> f32 {
    let text = text.to_lowercase();
    let words: Vec<String> = message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let hits = words.iter().filter(|w| text.contains(w.as_str())).count();
    hits as f32 / words.len() as f32
}

/// Cut to at most `max` characters, ending in "..." when cut.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> FounderProfile {
        FounderProfile::default()
    }

    #[tokio::test]
    async fn static_files_become_documents() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("founder-profile.md"),
            "Values courage and integrity.",
        )
        .await
        .unwrap();
        let assembler = ContextAssembler::open(dir.path(), TopicGuard::default(), 2000).await;

        let docs = assembler.retrieve("what are my values", &profile()).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "founder_profile");
        assert!(docs[0].relevance > 0.0);
    }

    #[tokio::test]
    async fn protected_documents_are_withheld() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("partnership-charter.md"),
            "We host everything on Sector 7 hardware.",
        )
        .await
        .unwrap();
        let assembler = ContextAssembler::open(dir.path(), TopicGuard::default(), 2000).await;
        assembler.add_dynamic("budget", "financial details for Q3").await;
        assembler.add_dynamic("sprint", "ship the onboarding flow").await;

        let docs = assembler.retrieve("onboarding sprint plan", &profile()).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "dynamic_sprint");
    }

    #[tokio::test]
    async fn unrelated_documents_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("founder-profile.md"),
            "Values courage and integrity.",
        )
        .await
        .unwrap();
        let assembler = ContextAssembler::open(dir.path(), TopicGuard::default(), 2000).await;
        assembler.add_dynamic("garden", "water the tomatoes").await;

        assert!(assembler.retrieve("book the flights", &profile()).await.is_empty());
        let docs = assembler.retrieve("did I water the tomatoes", &profile()).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "dynamic_garden");
    }

    #[test]
    fn hints_follow_keywords() {
        let assembler = ContextAssembler::new(TopicGuard::default(), 2000);
        assert_eq!(assembler.topical_hints("should I take the option?").len(), 1);
        assert!(assembler.topical_hints("I'm tired, need food").contains(&SELF_CARE_HINT));
        assert!(assembler.topical_hints("hello").is_empty());
    }

    #[test]
    fn assemble_drops_sections_whole() {
        let assembler = ContextAssembler::new(TopicGuard::default(), 2000);
        let profile = profile();
        let snapshot = profile.snapshot();
        let docs = vec![
            Document {
                id: "a".into(),
                title: "Infra".into(),
                text: "The ghost project runs nightly.".into(),
                relevance: 1.0,
            },
            Document {
                id: "b".into(),
                title: "Roadmap".into(),
                text: "Launch in spring.".into(),
                relevance: 0.5,
            },
        ];
        let out = assembler.assemble(&AssemblyInput {
            message: "what's the roadmap",
            profile: &profile,
            snapshot: &snapshot,
            documents: &docs,
            patterns: "",
        });
        assert!(out.contains("**About the founder:**"));
        assert!(out.contains("Launch in spring."));
        assert!(!out.contains("Infra"));
        assert!(!out.contains("nightly"));
    }

    #[test]
    fn assemble_truncates_to_limit() {
        let assembler = ContextAssembler::new(TopicGuard::default(), 40);
        let profile = profile();
        let snapshot = profile.snapshot();
        let out = assembler.assemble(&AssemblyInput {
            message: "hi",
            profile: &profile,
            snapshot: &snapshot,
            documents: &[],
            patterns: "\n**Time Patterns:**\n- Deep work mornings (confidence: 50%)",
        });
        assert_eq!(out.chars().count(), 40);
        assert!(out.ends_with("..."));
    }
}
