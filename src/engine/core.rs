// src/engine/core.rs

//! Pure core of the watch engine.
//!
//! `WatchCore` consumes the outcome of scanning one root and produces:
//! - an updated snapshot store
//! - the finalized, origin-tagged change records for that root
//! - whether the IO shell has to recreate the root directory
//!
//! It performs no IO and has no Tokio types beyond the `Instant` it is
//! handed, so it can be unit tested with hand-built snapshots.

use std::path::Path;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::ChangeRecord;
use crate::watch::filter::LoopbackFilter;
use crate::watch::scanner::ScanError;
use crate::watch::snapshot::{diff, Snapshot, SnapshotStore};

/// Result of feeding one root's scan into the core.
#[derive(Debug, Default)]
pub struct RootStep {
    /// Records to publish, in deterministic (lexicographic path) order.
    pub records: Vec<ChangeRecord>,
    /// The root was missing and should be created again.
    pub recreate_root: bool,
}

#[derive(Debug)]
pub struct WatchCore {
    store: SnapshotStore,
    filter: LoopbackFilter,
}

impl WatchCore {
    pub fn new(filter: LoopbackFilter) -> Self {
        Self {
            store: SnapshotStore::new(),
            filter,
        }
    }

    pub fn snapshot(&self, root: &Path) -> Option<&Snapshot> {
        self.store.get(root)
    }

    /// Install the initial snapshot for `root` without emitting anything.
    pub fn baseline(&mut self, root: &Path, snapshot: Snapshot) {
        debug!(root = ?root, files = snapshot.len(), "baseline snapshot stored");
        self.store.replace(root, snapshot);
    }

    /// Handle the scan outcome for one root.
    ///
    /// - First successful scan of a root: becomes the baseline, no records.
    /// - Later successful scans: diffed against the stored snapshot, which
    ///   is replaced before any record leaves the core.
    /// - Failed scans: logged; the stored snapshot is kept as is.
    pub fn step(
        &mut self,
        root: &Path,
        scan: Result<Snapshot, ScanError>,
        now: Instant,
    ) -> RootStep {
        let current = match scan {
            Ok(snapshot) => snapshot,
            Err(err) => return self.scan_failed(err),
        };

        let Some(previous) = self.store.replace(root, current) else {
            debug!(root = ?root, "first scan of root; treating as baseline");
            return RootStep::default();
        };

        // `replace` just stored it, so the lookup cannot miss.
        let Some(current) = self.store.get(root) else {
            return RootStep::default();
        };

        let records: Vec<ChangeRecord> = diff(&previous, current)
            .into_iter()
            .map(|raw| self.filter.finalize(raw, now))
            .collect();

        for record in &records {
            if record.is_external() {
                info!(
                    kind = %record.kind,
                    path = ?record.path,
                    "external file system event"
                );
            } else {
                debug!(
                    kind = %record.kind,
                    path = ?record.path,
                    "internal file system event"
                );
            }
        }

        RootStep {
            records,
            recreate_root: false,
        }
    }

    fn scan_failed(&self, err: ScanError) -> RootStep {
        let recreate_root = matches!(err, ScanError::RootMissing(_));
        if recreate_root {
            warn!(root = ?err.root(), "watched root disappeared; recreating it");
        } else {
            warn!(root = ?err.root(), error = %err, "scan failed; keeping previous snapshot");
        }
        RootStep {
            records: Vec::new(),
            recreate_root,
        }
    }
}
