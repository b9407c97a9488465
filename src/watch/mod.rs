// src/watch/mod.rs

//! Change detection building blocks.
//!
//! This module is responsible for:
//! - Scanning a root into a [`Snapshot`] (regular files → mtime).
//! - Diffing two snapshots into raw created/modified/deleted changes.
//! - The self-modification ledger and the loopback filter that tags each
//!   change as `internal` or `external`.
//! - Small hashing / processed-state helpers handlers use for idempotence.
//!
//! It does **not** know about handlers or dispatch; it only turns directory
//! state into change records.

pub mod cache;
pub mod filter;
pub mod hash;
pub mod ledger;
pub mod path_utils;
pub mod scanner;
pub mod snapshot;

pub use cache::ProcessedStates;
pub use filter::LoopbackFilter;
pub use ledger::{LedgerHandle, SelfModificationLedger, DEFAULT_SUPPRESSION_WINDOW};
pub use scanner::{build_exclude_set, ScanError, ScanLimits, Scanner};
pub use snapshot::{diff, RawChange, Snapshot, SnapshotStore};
