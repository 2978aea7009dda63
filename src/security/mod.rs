//! Trust boundary: who may get a substantive answer, and what may be said.
//!
//! - `access`: tier evaluation, secure-surface test, respond/redirect gate
//! - `topic_guard`: protected-topic pre-check and all-or-nothing redaction

pub mod access;
pub mod topic_guard;

pub use access::{AccessDecision, AccessPolicy, SecurityContext, SecurityLevel, SurfaceKind};
pub use topic_guard::TopicGuard;
