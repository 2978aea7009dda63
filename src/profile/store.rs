//! Persistence collaborator for the founder profile.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::storage;

use super::model::FounderProfile;

/// One audit-log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AccessLogEntry {
    pub fn new(action: impl Into<String>, details: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            details,
        }
    }
}

/// Load/save one profile record plus an append-only audit log.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load the profile, `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<FounderProfile>, StoreError>;

    /// Persist the profile, replacing any previous record.
    async fn save(&self, profile: &FounderProfile) -> Result<(), StoreError>;

    /// Append an audit entry.
    async fn append_log(&self, entry: &AccessLogEntry) -> Result<(), StoreError>;

    /// Read back the audit log, oldest first.
    async fn read_log(&self) -> Result<Vec<AccessLogEntry>, StoreError>;
}

/// Profile store backed by a private directory:
/// `founder_context.json` and `access_log.jsonl`.
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub const PROFILE_FILE: &'static str = "founder_context.json";
    pub const ACCESS_LOG_FILE: &'static str = "access_log.jsonl";

    /// Open (and create, 0700) the store directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        storage::ensure_private_dir(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn load(&self) -> Result<Option<FounderProfile>, StoreError> {
        storage::read_json(&self.dir.join(Self::PROFILE_FILE)).await
    }

    async fn save(&self, profile: &FounderProfile) -> Result<(), StoreError> {
        storage::write_json(&self.dir.join(Self::PROFILE_FILE), profile).await
    }

    async fn append_log(&self, entry: &AccessLogEntry) -> Result<(), StoreError> {
        storage::append_json_line(&self.dir.join(Self::ACCESS_LOG_FILE), entry).await
    }

    async fn read_log(&self) -> Result<Vec<AccessLogEntry>, StoreError> {
        storage::read_json_lines(&self.dir.join(Self::ACCESS_LOG_FILE)).await
    }
}
