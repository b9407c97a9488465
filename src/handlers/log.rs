// src/handlers/log.rs

use tracing::info;

use crate::dispatch::{Handler, HandlerFuture};
use crate::engine::ChangeRecord;

/// Logs every externally caused change. Internal ones are already logged at
/// debug level by the engine.
#[derive(Debug, Default)]
pub struct LogHandler;

impl Handler for LogHandler {
    fn name(&self) -> &str {
        "log"
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            if record.is_external() {
                info!(
                    kind = %record.kind,
                    origin = %record.origin,
                    path = ?record.path,
                    "file changed"
                );
            }
            Ok(())
        })
    }
}
