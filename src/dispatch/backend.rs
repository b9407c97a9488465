// src/dispatch/backend.rs

//! Pluggable dispatch backend.
//!
//! The runtime hands each tick's records to a `DispatchBackend` rather than
//! to a raw mpsc sender, so tests can swap in a fake that just records what
//! was published.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatch::dispatcher_loop::spawn_dispatcher;
use crate::dispatch::publisher::EventPublisher;
use crate::engine::ChangeRecord;
use crate::errors::Result;

pub trait DispatchBackend: Send {
    /// Queue `records` for delivery, preserving their order.
    fn dispatch(
        &mut self,
        records: Vec<ChangeRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: forwards records to the background dispatcher.
///
/// Queuing never waits on handler progress, so a tick's dispatch step
/// finishes as soon as its records are enqueued.
#[derive(Debug, Clone)]
pub struct RealDispatchBackend {
    tx: mpsc::UnboundedSender<ChangeRecord>,
}

impl RealDispatchBackend {
    /// Spawns the dispatcher immediately and detaches it.
    pub fn new(publisher: Arc<EventPublisher>) -> Self {
        Self::spawn(publisher).0
    }

    /// Like [`RealDispatchBackend::new`], also returning the dispatcher handle,
    /// which completes once the backend is dropped and the queue drained.
    pub fn spawn(publisher: Arc<EventPublisher>) -> (Self, JoinHandle<()>) {
        let (tx, worker) = spawn_dispatcher(publisher);
        (Self { tx }, worker)
    }
}

impl DispatchBackend for RealDispatchBackend {
    fn dispatch(
        &mut self,
        records: Vec<ChangeRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let queued: Result<()> = records
            .into_iter()
            .try_for_each(|record| self.tx.send(record))
            .map_err(|_| anyhow!("dispatcher is gone").into());

        Box::pin(std::future::ready(queued))
    }
}
