//! Singleton batch-approval record.
//!
//! At most one record is live at a time; the store is one JSON file.
//! Expired records read as absent and are replaced on the next write.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::now_epoch_secs;

/// A pending plan goes stale after ten minutes.
const BATCH_TTL_SECS: u64 = 10 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Approved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub session_id: String,
    pub commands: Vec<String>,
    pub status: BatchStatus,
    pub summary: String,
    pub created_at: u64,
}

impl BatchRecord {
    pub fn is_member(&self, command: &str) -> bool {
        let needle = command.trim();
        self.commands.iter().any(|c| c.trim() == needle)
    }
}

pub struct BatchStore {
    path: PathBuf,
}

impl BatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The live record, if any. Expired or unreadable records are absent.
    pub fn load(&self) -> Option<BatchRecord> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let record: BatchRecord = serde_json::from_str(&content).ok()?;
        let age = now_epoch_secs().saturating_sub(record.created_at);
        (age <= BATCH_TTL_SECS).then_some(record)
    }

    /// Replace the record wholesale. Best-effort.
    pub fn save(&self, record: &BatchRecord) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string(record) {
            let _ = std::fs::write(&self.path, json);
        }
    }

    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
