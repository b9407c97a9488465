// src/handlers/json.rs

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dispatch::{Handler, HandlerError, HandlerFuture};
use crate::engine::ChangeRecord;
use crate::fs::FileSystem;
use crate::handlers::remote::RemoteClient;
use crate::types::ChangeKind;
use crate::watch::hash::content_key;
use crate::watch::path_utils::has_suffix;
use crate::watch::ProcessedStates;

/// Sends the parsed contents of created or modified `.json` files to an
/// HTTP endpoint. A given content is only sent once per path.
#[derive(Debug)]
pub struct JsonHandler {
    fs: Arc<dyn FileSystem>,
    remote: Arc<dyn RemoteClient>,
    endpoint: String,
    sent: ProcessedStates,
}

impl JsonHandler {
    pub fn new(fs: Arc<dyn FileSystem>, remote: Arc<dyn RemoteClient>, endpoint: impl Into<String>) -> Self {
        Self {
            fs,
            remote,
            endpoint: endpoint.into(),
            sent: ProcessedStates::default(),
        }
    }

    async fn send(&self, record: &ChangeRecord) -> Result<(), HandlerError> {
        let path = &record.path;
        if !self.fs.is_file(path) {
            warn!(path = ?path, "json file vanished before it could be sent");
            return Ok(());
        }

        let content = self.fs.read(path)?;
        let key = content_key(path, &content);
        if self.sent.is_processed(&key) {
            debug!(path = ?path, "json content already sent; skipping");
            return Ok(());
        }

        let document: Value = serde_json::from_slice(&content)
            .map_err(|e| HandlerError::fatal(format!("invalid JSON in {}: {e}", path.display())))?;

        self.remote.post_json(&self.endpoint, &document).await?;
        self.sent.remember(key);

        info!(path = ?path, kind = %record.kind, endpoint = %self.endpoint, "json file sent");
        Ok(())
    }
}

impl Handler for JsonHandler {
    fn name(&self) -> &str {
        "json"
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            if record.kind == ChangeKind::Deleted || !has_suffix(&record.path, &[".json"]) {
                return Ok(());
            }
            self.send(record).await
        })
    }
}
