// src/watch/filter.rs

//! Loopback filter: attaches an origin to every raw change.

use std::sync::Arc;

use tokio::time::Instant;

use crate::engine::ChangeRecord;
use crate::types::Origin;
use crate::watch::ledger::SelfModificationLedger;
use crate::watch::snapshot::RawChange;

/// Tags changes found in the ledger as `internal`, everything else as
/// `external`. Nothing is ever dropped here; handlers that must ignore
/// their own writes check the origin themselves.
#[derive(Debug, Clone)]
pub struct LoopbackFilter {
    ledger: Arc<SelfModificationLedger>,
}

impl LoopbackFilter {
    pub fn new(ledger: Arc<SelfModificationLedger>) -> Self {
        Self { ledger }
    }

    pub fn finalize(&self, raw: RawChange, now: Instant) -> ChangeRecord {
        let origin = if self.ledger.was_self_modified_at(&raw.path, now) {
            Origin::Internal
        } else {
            Origin::External
        };

        ChangeRecord {
            path: raw.path,
            kind: raw.kind,
            origin,
            mtime: raw.mtime,
        }
    }
}
