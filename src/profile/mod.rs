//! Founder profile: the small persisted record that personalizes replies.
//!
//! The manager is the single writer. Every read and write lands in an
//! append-only access log the founder can review.

pub mod manager;
pub mod model;
pub mod store;

pub use manager::ProfileManager;
pub use model::{FounderProfile, Goal, ProfileSnapshot};
pub use store::{AccessLogEntry, FileProfileStore, ProfileStore};
