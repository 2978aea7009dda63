//! Bounded learning and prompt context.
//!
//! - `patterns`: allow-listed, per-domain pattern store behind a feedback gate
//! - `context`: guarded context assembly from profile, documents, and patterns

pub mod context;
pub mod patterns;

pub use context::{AssemblyInput, ContextAssembler, Document};
pub use patterns::{
    Feedback, Interaction, LearningDomain, LearningGate, Observation, Pattern, PatternStore,
};
