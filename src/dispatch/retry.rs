// src/dispatch/retry.rs

//! Retry policy and the problem list of permanently failed deliveries.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::engine::ChangeRecord;

/// How often, and how patiently, a handler is retried after transient
/// failures.
///
/// `max_attempts` counts every invocation including the first. Before
/// attempt `n + 1` the publisher waits `backoff[n - 1]`; when the schedule
/// is shorter than needed its last entry is reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(1) as usize;
        self.backoff
            .get(idx)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// True if another attempt is allowed after `attempt` attempts.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Identity of one delivery: which handler, which exact file state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProblemKey {
    pub handler: String,
    pub path: PathBuf,
    pub mtime: SystemTime,
}

impl ProblemKey {
    pub fn new(handler: &str, record: &ChangeRecord) -> Self {
        Self {
            handler: handler.to_string(),
            path: record.path.clone(),
            mtime: record.mtime,
        }
    }
}

/// (handler, path, mtime) combinations that failed for good.
///
/// The publisher consults this before every invocation and never calls a
/// handler again for a listed combination.
#[derive(Debug, Default)]
pub struct ProblemList {
    entries: Mutex<HashSet<ProblemKey>>,
}

impl ProblemList {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashSet<ProblemKey>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `key`. Returns false if it was already listed.
    pub fn record(&self, key: ProblemKey) -> bool {
        self.entries().insert(key)
    }

    pub fn contains(&self, key: &ProblemKey) -> bool {
        self.entries().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Sorted copy of the current entries.
    pub fn entries_sorted(&self) -> Vec<ProblemKey> {
        let mut list: Vec<_> = self.entries().iter().cloned().collect();
        list.sort_by(|a, b| (&a.handler, &a.path).cmp(&(&b.handler, &b.path)));
        list
    }
}
