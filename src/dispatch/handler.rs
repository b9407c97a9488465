// src/dispatch/handler.rs

//! The contract between the engine and its handlers.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::engine::ChangeRecord;

/// Why a handler failed on a record.
///
/// `Transient` failures are retried when the handler was registered with a
/// retry policy; `Fatal` ones never are.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn transient(msg: impl Into<String>) -> Self {
        HandlerError::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        HandlerError::Fatal(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}

/// IO problems are usually momentary (a file still being copied, a full
/// disk being cleaned up), so they count as transient.
impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Transient(err.to_string())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Transient(format!("{err:#}"))
    }
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// A side effect run for every published change record.
///
/// Handlers decide for themselves which records they care about and return
/// `Ok(())` for the rest. They must be idempotent: the same record (or a
/// logically identical one) can arrive more than once through retries and
/// repeated ticks. A handler that writes into a watched root calls
/// [`crate::watch::LedgerHandle::mark_self_modified`] right before writing.
pub trait Handler: Send + Sync + 'static {
    /// Stable name used in logs and in the problem list.
    fn name(&self) -> &str;

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a>;
}
