//! Persistent decision cache.
//!
//! The only mechanism that carries a decision across otherwise-independent
//! invocations. Only definitive approvals are stored; denials never are.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::now_epoch_secs;
use crate::parse;

/// Entries from other sessions stay usable this long.
const CROSS_SESSION_TTL_SECS: u64 = 24 * 3600;
/// Entries older than this are purged on every write and never hit.
const HARD_EXPIRY_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub decision: String,
    pub session_id: String,
    pub timestamp: u64,
}

pub struct DecisionCache {
    path: PathBuf,
}

impl DecisionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Look up a prior approval. A hit requires the entry's session to
    /// match, or the entry to be younger than 24 hours.
    pub fn get(&self, session_id: &str, command: &str) -> Option<CacheEntry> {
        let map = self.load();
        let entry = map.get(&normalize_key(command))?;
        if entry.decision != "approve" {
            return None;
        }
        let age = now_epoch_secs().saturating_sub(entry.timestamp);
        if age > HARD_EXPIRY_SECS {
            return None;
        }
        (entry.session_id == session_id || age < CROSS_SESSION_TTL_SECS).then(|| entry.clone())
    }

    /// Record an approval. Hard-expired entries are purged on every write,
    /// regardless of which session owns them.
    pub fn put(&self, session_id: &str, command: &str) {
        let mut map = self.load();
        let now = now_epoch_secs();
        map.retain(|_, e| now.saturating_sub(e.timestamp) <= HARD_EXPIRY_SECS);
        map.insert(
            normalize_key(command),
            CacheEntry {
                decision: "approve".into(),
                session_id: session_id.into(),
                timestamp: now,
            },
        );
        self.save(&map);
    }

    fn load(&self) -> HashMap<String, CacheEntry> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn save(&self, map: &HashMap<String, CacheEntry>) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string(map) {
            let _ = std::fs::write(&self.path, json);
        }
    }

    /// Write a raw entry with an arbitrary timestamp. Test hook for aging.
    #[cfg(test)]
    pub fn put_raw(&self, command: &str, entry: CacheEntry) {
        let mut map = self.load();
        map.insert(normalize_key(command), entry);
        self.save(&map);
    }

    #[cfg(test)]
    pub fn raw_keys(&self) -> Vec<String> {
        self.load().keys().cloned().collect()
    }
}

/// Canonicalize `cd TARGET && REST` to `REST@TARGET` so equivalent
/// invocations issued with different directory-change prefixes share a key.
pub fn normalize_key(command: &str) -> String {
    let segments = parse::split_commands(command);
    if segments.len() >= 2 {
        let words = parse::words(&segments[0]);
        if words.len() == 2 && words[0] == "cd" {
            return format!("{}@{}", segments[1..].join(" && "), words[1]);
        }
    }
    command.trim().to_string()
}
