//! Access control evaluator and the "should respond" gate.
//!
//! Tier comes from the sender's roles; secure-surface status comes from the
//! surface name. The gate combines the two, and the combination is not
//! monotonic in tier (see `AccessPolicy::decide`).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Roles that grant founder-level access.
const FOUNDER_ROLES: &[&str] = &["founder", "co-founder"];

/// Roles held by the assistant's own agent team.
const AGENT_ROLES: &[&str] = &["agent team", "aurora system", "agent-team"];

/// Roles held by the development team.
const DEV_ROLES: &[&str] = &["development", "developer", "dev team"];

/// Surfaces cleared for sensitive discussion.
const SECURE_SURFACES: &[&str] = &["aurora-forester", "aurora", "founder-private", "sector7"];

/// Refusal for a low-tier sender who somehow landed in a secure surface.
pub const PRIVATE_SURFACE_REDIRECT: &str = "This is a private channel. Please reach out to Otto \
     in the general channels if you need assistance!";

/// Refusal for members and the public, pointing at the public guide.
pub const PUBLIC_GUIDE_REDIRECT: &str = "Hi there! I'm Aurora, and I primarily work with the \
     founder team. For general questions about Hello World Co-Op, Otto is your guide! You can \
     find Otto in the main channels, or type `@Otto` for help. Otto knows all about the \
     platform, Otter Camp, and how to get started!";

/// Ordered trust tiers. Comparison follows trust: `Founder > AgentTeam > ... > Public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Public,
    Member,
    Development,
    AgentTeam,
    Founder,
}

impl SecurityLevel {
    /// Tiers that may see protected content (on a secure surface).
    pub fn has_full_access(&self) -> bool {
        matches!(self, Self::Founder | Self::AgentTeam)
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::Member => "member",
            Self::Development => "development",
            Self::AgentTeam => "agent_team",
            Self::Founder => "founder",
        };
        write!(f, "{s}")
    }
}

/// Shape of the surface a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Multi-party surface (guild channel, group chat).
    Shared,
    /// Private 1:1 surface (DM, SMS thread, local terminal).
    Direct,
}

/// Per-message security context. Built fresh for every message, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    pub sender_id: String,
    pub sender_name: String,
    pub surface_id: String,
    pub surface_name: String,
    pub roles: HashSet<String>,
    pub is_direct: bool,
    pub level: SecurityLevel,
    pub is_secure_surface: bool,
}

/// Outcome of the respond/redirect gate.
///
/// A refusal always carries its redirect text and an approval never does,
/// so `(true, Some(_))` and `(false, None)` are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Respond,
    Redirect(String),
}

impl AccessDecision {
    pub fn may_respond(&self) -> bool {
        matches!(self, Self::Respond)
    }

    pub fn redirect_text(&self) -> Option<&str> {
        match self {
            Self::Respond => None,
            Self::Redirect(text) => Some(text),
        }
    }

    /// Tuple form for adapters: `(may_respond, redirect_text)`.
    pub fn into_parts(self) -> (bool, Option<String>) {
        match self {
            Self::Respond => (true, None),
            Self::Redirect(text) => (false, Some(text)),
        }
    }
}

/// Role sets and secure-surface allow-list. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    founder_roles: HashSet<String>,
    agent_roles: HashSet<String>,
    dev_roles: HashSet<String>,
    secure_surfaces: HashSet<String>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            founder_roles: lowered(FOUNDER_ROLES),
            agent_roles: lowered(AGENT_ROLES),
            dev_roles: lowered(DEV_ROLES),
            secure_surfaces: lowered(SECURE_SURFACES),
        }
    }
}

fn lowered(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

impl AccessPolicy {
    /// Add a surface name to the secure allow-list (e.g. the local terminal).
    pub fn with_secure_surface(mut self, name: &str) -> Self {
        self.secure_surfaces.insert(name.to_lowercase());
        self
    }

    /// Resolve a sender's tier.
    ///
    /// Senders with roles but none of the privileged ones are members.
    ///
    /// `roles` is `None` when the sender has no resolvable membership at all.
    /// Such a sender is a member on a direct surface but public on a shared
    /// one: someone posting in a shared space without community membership
    /// is treated as outside the community, not as a member.
    pub fn evaluate(
        &self,
        roles: Option<&HashSet<String>>,
        surface_name: &str,
        kind: SurfaceKind,
    ) -> SecurityLevel {
        let Some(roles) = roles else {
            let level = match kind {
                SurfaceKind::Direct => SecurityLevel::Member,
                SurfaceKind::Shared => SecurityLevel::Public,
            };
            debug!(surface = %surface_name, %level, "No resolvable roles");
            return level;
        };

        let roles: HashSet<String> = roles.iter().map(|r| r.to_lowercase()).collect();
        let level = if intersects(&roles, &self.founder_roles) {
            SecurityLevel::Founder
        } else if intersects(&roles, &self.agent_roles) {
            SecurityLevel::AgentTeam
        } else if intersects(&roles, &self.dev_roles) {
            SecurityLevel::Development
        } else {
            SecurityLevel::Member
        };
        debug!(surface = %surface_name, %level, "Resolved security level");
        level
    }

    /// Case-insensitive membership test against the secure allow-list.
    pub fn is_secure_surface(&self, name: &str) -> bool {
        self.secure_surfaces.contains(&name.to_lowercase())
    }

    /// Build the security context for one inbound message.
    ///
    /// A direct surface is never secure, whoever the sender is.
    pub fn context(
        &self,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        surface_id: impl Into<String>,
        surface_name: impl Into<String>,
        kind: SurfaceKind,
        roles: Option<HashSet<String>>,
    ) -> SecurityContext {
        let surface_name = surface_name.into();
        let level = self.evaluate(roles.as_ref(), &surface_name, kind);
        let is_direct = kind == SurfaceKind::Direct;
        let is_secure_surface = !is_direct && self.is_secure_surface(&surface_name);

        SecurityContext {
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            surface_id: surface_id.into(),
            surface_name,
            roles: roles.unwrap_or_default(),
            is_direct,
            level,
            is_secure_surface,
        }
    }

    /// Decide whether the assistant answers or redirects.
    ///
    /// Evaluated in order: founder, agent team, development all respond on
    /// any surface (the topic guard still applies off secure surfaces);
    /// anyone else in a secure surface gets the private-surface notice;
    /// everyone else gets the public-guide notice.
    pub fn decide(&self, ctx: &SecurityContext) -> AccessDecision {
        match ctx.level {
            SecurityLevel::Founder => {
                info!(
                    sender = %ctx.sender_name,
                    level = "founder",
                    surface = %ctx.surface_name,
                    "Access granted"
                );
                AccessDecision::Respond
            }
            SecurityLevel::AgentTeam | SecurityLevel::Development => AccessDecision::Respond,
            SecurityLevel::Member | SecurityLevel::Public if ctx.is_secure_surface => {
                warn!(
                    sender = %ctx.sender_name,
                    surface = %ctx.surface_name,
                    "Unauthorized sender in secure surface"
                );
                AccessDecision::Redirect(PRIVATE_SURFACE_REDIRECT.to_string())
            }
            SecurityLevel::Member | SecurityLevel::Public => {
                info!(
                    sender = %ctx.sender_name,
                    surface = %ctx.surface_name,
                    "Redirecting to public guide"
                );
                AccessDecision::Redirect(PUBLIC_GUIDE_REDIRECT.to_string())
            }
        }
    }
}

fn intersects(a: &HashSet<String>, b: &HashSet<String>) -> bool {
    a.iter().any(|r| b.contains(r))
}
