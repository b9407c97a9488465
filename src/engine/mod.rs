// src/engine/mod.rs

//! Change-detection engine for pollwatch.
//!
//! This module ties together:
//! - the snapshot store and diff (one snapshot per watched root)
//! - the loopback filter (internal vs external origin)
//! - the polling loop that scans every root once per tick and hands the
//!   finalized records to a dispatch backend
//!
//! The pure, synchronous core lives in [`core`]; the async/IO shell (timer,
//! blocking scans, shutdown) is implemented in [`runtime`].

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

pub use crate::types::{ChangeKind, Origin};

/// A finalized change notification, as delivered to handlers.
///
/// Immutable once published. `mtime` is the timestamp observed for the new
/// state (or the last known timestamp for deletions) and, together with
/// `path`, identifies the exact state the record describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub origin: Origin,
    pub mtime: SystemTime,
}

impl ChangeRecord {
    pub fn is_external(&self) -> bool {
        self.origin == Origin::External
    }
}

/// Runtime options for the polling loop.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Time between the start of two ticks.
    pub tick_interval: Duration,
    /// Stop after this many ticks (not counting the baseline scan). `None`
    /// runs until shutdown is requested.
    pub max_ticks: Option<u64>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_ticks: None,
        }
    }
}

pub mod core;
pub mod runtime;

pub use self::core::{RootStep, WatchCore};
pub use runtime::Runtime;
