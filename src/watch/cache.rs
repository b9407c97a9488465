// src/watch/cache.rs

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Inner {
    keys: HashSet<String>,
    order: VecDeque<String>,
}

/// Bounded set of file-state keys a handler has already processed.
///
/// Each handler owns its own instance. Keys come from
/// [`crate::watch::hash::state_key`] or [`crate::watch::hash::content_key`].
/// Once full, the oldest key is forgotten first.
#[derive(Debug)]
pub struct ProcessedStates {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ProcessedStates {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.inner().keys.contains(key)
    }

    /// Remember `key`. Returns false if it was already known.
    pub fn remember(&self, key: impl Into<String>) -> bool {
        let key = key.into();
        let mut inner = self.inner();
        if !inner.keys.insert(key.clone()) {
            return false;
        }
        inner.order.push_back(key);

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.keys.remove(&oldest);
                debug!("processed-state cache full; forgot oldest key");
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().keys.is_empty()
    }
}

impl Default for ProcessedStates {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
