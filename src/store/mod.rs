//! File-backed shared state.
//!
//! Three stores live in a per-user directory and are raced by concurrent
//! invocations: the decision cache, the oracle lock marker, and the batch
//! record. Reads and writes are best-effort; a lost update costs at most
//! one extra oracle round trip, never an incorrect allow.

pub mod batch;
pub mod cache;
pub mod lock;

pub use batch::{BatchRecord, BatchStatus, BatchStore};
pub use cache::DecisionCache;
pub use lock::{LockPolicy, OracleLock};

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const APP_DIR: &str = "cc-smartgate";

/// Per-user configuration/state directory (~/.config/cc-smartgate).
pub fn config_dir() -> Option<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join(APP_DIR))
}

/// Handle to the directory holding all persisted state files.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// The default per-user location. None when no home is resolvable.
    pub fn default_user() -> Option<Self> {
        config_dir().map(Self::at)
    }

    /// An explicit root (tests point this at a temp dir).
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) {
        let _ = std::fs::create_dir_all(&self.root);
    }

    pub fn cache(&self) -> DecisionCache {
        DecisionCache::new(self.root.join("cache.json"))
    }

    pub fn lock(&self) -> OracleLock {
        OracleLock::new(self.root.join("oracle.lock"))
    }

    pub fn batch(&self) -> BatchStore {
        BatchStore::new(self.root.join("batch.json"))
    }

    pub fn debug_log(&self) -> PathBuf {
        self.root.join("debug.log")
    }
}

/// Seconds since the Unix epoch.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
