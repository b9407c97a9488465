// src/dispatch/dispatcher_loop.rs

//! Background fan-out that hands change records to the handlers.
//!
//! Every registered handler gets its own lane: a task draining an unbounded
//! queue in order. The runtime only ever pushes onto queues, so a slow
//! handler delays its own lane and nothing else.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatch::publisher::{Delivery, EventPublisher};
use crate::dispatch::registry::HandlerRegistration;
use crate::engine::ChangeRecord;

/// A lane's backlog is reported each time it grows by this many records.
const BACKLOG_WARN_STEP: usize = 1_000;

struct Lane {
    name: String,
    tx: mpsc::UnboundedSender<Arc<ChangeRecord>>,
    backlog: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl Lane {
    fn spawn(publisher: Arc<EventPublisher>, registration: HandlerRegistration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ChangeRecord>>();
        let backlog = Arc::new(AtomicUsize::new(0));
        let name = registration.name().to_string();

        let task = {
            let backlog = Arc::clone(&backlog);
            tokio::spawn(async move {
                while let Some(record) = rx.recv().await {
                    backlog.fetch_sub(1, Ordering::Relaxed);
                    let path = record.path.clone();
                    let outcome = publisher.deliver(&registration, record).await;
                    if outcome != Delivery::Succeeded {
                        debug!(handler = registration.name(), path = ?path, ?outcome, "record delivered");
                    }
                }
            })
        };

        Self {
            name,
            tx,
            backlog,
            task,
        }
    }

    fn push(&self, record: Arc<ChangeRecord>) {
        let queued = self.backlog.fetch_add(1, Ordering::Relaxed) + 1;
        if queued % BACKLOG_WARN_STEP == 0 {
            warn!(handler = %self.name, queued, "handler is falling behind");
        }
        if self.tx.send(record).is_err() {
            error!(handler = %self.name, "handler lane stopped; record dropped");
        }
    }
}

/// Spawn the dispatcher.
///
/// Sending on the returned channel never waits for a handler. Each handler
/// sees records in the order they were sent, so a root's records arrive in
/// lexicographic path order; different handlers progress independently.
/// The dispatcher ends when every sender is dropped, after the lanes have
/// drained and outstanding retries have finished; the returned handle
/// completes then.
pub fn spawn_dispatcher(
    publisher: Arc<EventPublisher>,
) -> (mpsc::UnboundedSender<ChangeRecord>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ChangeRecord>();

    let worker = tokio::spawn(async move {
        let lanes: Vec<Lane> = publisher
            .registry()
            .iter()
            .cloned()
            .map(|registration| Lane::spawn(Arc::clone(&publisher), registration))
            .collect();
        info!(handlers = ?publisher.registry().names(), "dispatcher started");

        while let Some(record) = rx.recv().await {
            let record = Arc::new(record);
            for lane in &lanes {
                lane.push(Arc::clone(&record));
            }
        }

        for Lane { name, tx, task, .. } in lanes {
            drop(tx);
            if let Err(err) = task.await {
                error!(handler = %name, error = %err, "handler lane ended abnormally");
            }
        }
        publisher.join_retries().await;
        info!("dispatcher finished (channel closed)");
    });

    (tx, worker)
}
