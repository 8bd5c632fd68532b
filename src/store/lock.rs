//! Advisory lock serializing oracle calls across invocations.
//!
//! The marker file holds a bare epoch timestamp. Exclusion is advisory:
//! after the bounded wait the guarded call proceeds without the lock —
//! liveness over strict mutual exclusion.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::now_epoch_secs;

/// Acquisition policy: staleness threshold, wait ceiling, poll interval.
#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    /// A marker at least this old was abandoned by a crashed holder.
    pub stale_after: Duration,
    /// Give up waiting after this long and run unlocked.
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            max_wait: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct OracleLock {
    path: PathBuf,
    policy: LockPolicy,
}

impl OracleLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_policy(path, LockPolicy::default())
    }

    pub fn with_policy(path: impl Into<PathBuf>, policy: LockPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    /// Run `f`, holding the lock when it could be acquired. A marker this
    /// process wrote is removed on every exit path; a live marker owned by
    /// someone else is left alone when acquisition degraded.
    pub fn with_lock<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = Guard {
            lock: self,
            acquired: self.acquire(),
        };
        f()
    }

    fn acquire(&self) -> bool {
        let start = Instant::now();
        loop {
            match self.marker_age() {
                None => {
                    self.write_marker();
                    return true;
                }
                Some(age) if age >= self.policy.stale_after => {
                    log::debug!("lock: overwriting stale marker ({age:?} old)");
                    self.write_marker();
                    return true;
                }
                Some(_) => {
                    if start.elapsed() >= self.policy.max_wait {
                        log::warn!("lock: wait ceiling reached, proceeding unlocked");
                        return false;
                    }
                    std::thread::sleep(self.policy.poll_interval);
                }
            }
        }
    }

    /// Age of the current marker. An unreadable or unparseable marker
    /// reads as absent, so a corrupt file cannot wedge the pipeline.
    fn marker_age(&self) -> Option<Duration> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let ts: u64 = content.trim().parse().ok()?;
        Some(Duration::from_secs(now_epoch_secs().saturating_sub(ts)))
    }

    fn write_marker(&self) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(&self.path, now_epoch_secs().to_string());
    }
}

struct Guard<'a> {
    lock: &'a OracleLock,
    acquired: bool,
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        if self.acquired {
            let _ = std::fs::remove_file(&self.lock.path);
        }
    }
}
