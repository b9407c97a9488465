#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use pollwatch::dispatch::{Handler, HandlerError, HandlerFuture};
use pollwatch::engine::ChangeRecord;

/// Shared, ordered log of `(handler name, record)` deliveries.
pub type DeliveryLog = Arc<Mutex<Vec<(String, ChangeRecord)>>>;

pub fn delivery_log() -> DeliveryLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records every delivery and always succeeds.
pub struct RecordingHandler {
    name: String,
    log: DeliveryLog,
}

impl RecordingHandler {
    pub fn new(name: &str, log: DeliveryLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log,
        })
    }
}

impl Handler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            self.log
                .lock()
                .unwrap()
                .push((self.name.clone(), record.clone()));
            Ok(())
        })
    }
}

/// Fails its first `failures` invocations with `error`, then succeeds.
pub struct FlakyHandler {
    name: String,
    failures: u32,
    error: HandlerError,
    calls: AtomicU32,
    log: DeliveryLog,
}

impl FlakyHandler {
    pub fn new(name: &str, failures: u32, error: HandlerError, log: DeliveryLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            failures,
            error,
            calls: AtomicU32::new(0),
            log,
        })
    }

    /// A handler that never succeeds.
    pub fn always(name: &str, error: HandlerError, log: DeliveryLog) -> Arc<Self> {
        Self::new(name, u32::MAX, error, log)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Handler for FlakyHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            self.log
                .lock()
                .unwrap()
                .push((self.name.clone(), record.clone()));
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        })
    }
}

/// Panics on every invocation.
pub struct PanickingHandler;

impl Handler for PanickingHandler {
    fn name(&self) -> &str {
        "panicking"
    }

    #[allow(unreachable_code)]
    fn handle<'a>(&'a self, _record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            panic!("handler bug");
            Ok(())
        })
    }
}
