// src/watch/ledger.rs

//! Self-modification ledger.
//!
//! Handlers that write into a watched root announce the write here first.
//! When the next scan sees the resulting change, the loopback filter finds
//! the entry and tags the change `internal` instead of `external`, which is
//! what keeps a handler from re-triggering itself forever.
//!
//! Entries expire after a fixed suppression window and are evicted lazily.
//! Time comes from `tokio::time::Instant` so tests can pause the clock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct SelfModificationLedger {
    window: Duration,
    entries: Mutex<HashMap<PathBuf, Instant>>,
}

impl SelfModificationLedger {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Narrow, cloneable handle given to handlers.
    pub fn handle(self: &Arc<Self>) -> LedgerHandle {
        LedgerHandle {
            ledger: Arc::clone(self),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so
    // a poisoned mutex is simply recovered.
    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_self_modified(&self, path: impl Into<PathBuf>) {
        self.mark_self_modified_at(path, Instant::now());
    }

    /// Record `at` for `path`. Last write wins.
    pub fn mark_self_modified_at(&self, path: impl Into<PathBuf>, at: Instant) {
        let path = path.into();
        let mut entries = self.entries();
        // Opportunistic sweep so paths that are never checked again do not
        // accumulate.
        entries.retain(|_, touched| !expired(*touched, at, self.window));
        trace!(path = ?path, "marked as self-modified");
        entries.insert(path, at);
    }

    pub fn was_self_modified(&self, path: &Path) -> bool {
        self.was_self_modified_at(path, Instant::now())
    }

    /// True iff `path` was marked less than one window before `now`.
    pub fn was_self_modified_at(&self, path: &Path, now: Instant) -> bool {
        let mut entries = self.entries();
        match entries.get(path) {
            Some(&touched) if !expired(touched, now, self.window) => true,
            Some(_) => {
                entries.remove(path);
                false
            }
            None => false,
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, touched| !expired(*touched, now, self.window));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for SelfModificationLedger {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESSION_WINDOW)
    }
}

fn expired(touched: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(touched) >= window
}

/// The only view of the ledger handlers get: they can announce writes but
/// cannot query or clear entries.
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    ledger: Arc<SelfModificationLedger>,
}

impl LedgerHandle {
    pub fn mark_self_modified(&self, path: &Path) {
        self.ledger.mark_self_modified(path);
    }
}
