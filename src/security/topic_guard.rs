//! Protected-topic guard.
//!
//! Inbound: `scan` returns the canned deflection for the first protected
//! topic found. Outbound: `redact` swaps the whole response for a fixed
//! notice unless the sender has full access on a secure surface. Never a
//! partial redaction, so the shape of the hidden fact does not leak.

use regex::Regex;
use tracing::warn;

use super::access::SecurityContext;

/// Replacement for any outbound text carrying a protected marker.
pub const REDACTION_NOTICE: &str = "[Content redacted - protected project reference]";

/// Protected topics in priority order, with their deflection.
const PROTECTED_TOPICS: &[(&str, &str)] = &[
    ("sector7", "This is a protected project. I can't discuss it here."),
    ("ghost project", "I'm not familiar with that topic in this context."),
    ("private infrastructure", "That's not something I can discuss publicly."),
];

/// Outbound markers. Looser than the topic list ("sector 7" also counts).
const REDACTION_MARKERS: &[&str] = &[
    r"sector\s?7",
    r"ghost\s+project",
    r"private\s+infrastructure",
];

/// Scans inbound and outbound text for protected topics.
#[derive(Debug, Clone)]
pub struct TopicGuard {
    topics: Vec<(String, String)>,
    markers: Vec<Regex>,
}

impl Default for TopicGuard {
    fn default() -> Self {
        let topics = PROTECTED_TOPICS
            .iter()
            .map(|(t, m)| (t.to_string(), m.to_string()))
            .collect();
        let markers = REDACTION_MARKERS
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("static redaction marker"))
            .collect();
        Self { topics, markers }
    }
}

impl TopicGuard {
    /// Pre-check on inbound text. First protected topic wins.
    pub fn scan(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.topics
            .iter()
            .find(|(topic, _)| lower.contains(topic.as_str()))
            .map(|(_, message)| message.as_str())
    }

    /// Whether `text` carries any outbound protected marker.
    pub fn contains_protected(&self, text: &str) -> bool {
        self.scan(text).is_some() || self.markers.iter().any(|re| re.is_match(text))
    }

    /// Post-check on outbound text.
    ///
    /// Full access needs both a full-access tier and a secure surface; a
    /// founder on a non-secure surface is still redacted.
    pub fn redact(&self, response: &str, ctx: &SecurityContext) -> String {
        if ctx.is_secure_surface && ctx.level.has_full_access() {
            return response.to_string();
        }

        if self.contains_protected(response) {
            warn!(
                sender = %ctx.sender_name,
                surface = %ctx.surface_name,
                level = %ctx.level,
                "Response redacted: protected reference"
            );
            return REDACTION_NOTICE.to_string();
        }

        response.to_string()
    }
}
