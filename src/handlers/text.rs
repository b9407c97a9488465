// src/handlers/text.rs

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dispatch::{Handler, HandlerError, HandlerFuture};
use crate::engine::ChangeRecord;
use crate::fs::FileSystem;
use crate::handlers::remote::{RemoteClient, RemoteError};
use crate::types::ChangeKind;
use crate::watch::hash::state_key;
use crate::watch::path_utils::has_suffix;
use crate::watch::{LedgerHandle, ProcessedStates};

/// Appends a sentence fetched from a remote source to every `.txt` file
/// that is created or modified from outside.
#[derive(Debug)]
pub struct TextHandler {
    fs: Arc<dyn FileSystem>,
    ledger: LedgerHandle,
    remote: Arc<dyn RemoteClient>,
    source_url: String,
    processed: ProcessedStates,
}

impl TextHandler {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        ledger: LedgerHandle,
        remote: Arc<dyn RemoteClient>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            ledger,
            remote,
            source_url: source_url.into(),
            processed: ProcessedStates::default(),
        }
    }

    /// First element of the JSON array the source answers with.
    async fn fetch_sentence(&self) -> Result<String, HandlerError> {
        let body = self.remote.get_json(&self.source_url).await?;
        body.get(0)
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                RemoteError::Decode {
                    url: self.source_url.clone(),
                    message: "expected a JSON array of strings".to_string(),
                }
                .into()
            })
    }

    async fn append(&self, record: &ChangeRecord) -> Result<(), HandlerError> {
        let path = &record.path;
        if !self.fs.is_file(path) {
            warn!(path = ?path, "text file vanished before it could be extended");
            return Ok(());
        }

        let key = state_key(path, self.fs.modified(path)?);
        if self.processed.is_processed(&key) {
            debug!(path = ?path, "text state already processed; skipping");
            return Ok(());
        }

        let sentence = self.fetch_sentence().await?;

        self.ledger.mark_self_modified(path);
        self.fs.append(path, format!("\n\n{sentence}").as_bytes())?;

        self.processed.remember(key);
        self.processed.remember(state_key(path, self.fs.modified(path)?));

        info!(path = ?path, kind = %record.kind, "text appended");
        Ok(())
    }
}

impl Handler for TextHandler {
    fn name(&self) -> &str {
        "text"
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            if !record.is_external()
                || record.kind == ChangeKind::Deleted
                || !has_suffix(&record.path, &[".txt"])
            {
                return Ok(());
            }
            self.append(record).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::handlers::testing::StubRemote;
    use crate::types::Origin;
    use crate::watch::SelfModificationLedger;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::time::UNIX_EPOCH;

    const SOURCE: &str = "https://bacon.test/api";

    fn record(path: &str, kind: ChangeKind, origin: Origin) -> ChangeRecord {
        ChangeRecord {
            path: PathBuf::from(path),
            kind,
            origin,
            mtime: UNIX_EPOCH,
        }
    }

    fn setup(remote: StubRemote) -> (MockFileSystem, Arc<SelfModificationLedger>, TextHandler) {
        let fs = MockFileSystem::new();
        let ledger = Arc::new(SelfModificationLedger::default());
        let handler = TextHandler::new(Arc::new(fs.clone()), ledger.handle(), Arc::new(remote), SOURCE);
        (fs, ledger, handler)
    }

    #[tokio::test]
    async fn appends_fetched_sentence_once_per_state() {
        let remote = StubRemote::new().with_json(SOURCE, json!(["Bacon ipsum dolor."]));
        let (fs, ledger, handler) = setup(remote);
        fs.add_file("/w/a.txt", b"hi".to_vec());

        handler
            .handle(&record("/w/a.txt", ChangeKind::Created, Origin::External))
            .await
            .unwrap();
        assert_eq!(fs.contents("/w/a.txt").unwrap(), b"hi\n\nBacon ipsum dolor.");
        assert!(ledger.was_self_modified(Path::new("/w/a.txt")));

        // A stray external record for the state we produced changes nothing.
        handler
            .handle(&record("/w/a.txt", ChangeKind::Modified, Origin::External))
            .await
            .unwrap();
        assert_eq!(fs.contents("/w/a.txt").unwrap(), b"hi\n\nBacon ipsum dolor.");
    }

    #[tokio::test]
    async fn internal_records_are_ignored() {
        let remote = StubRemote::new().with_json(SOURCE, json!(["x"]));
        let calls = remote.calls();
        let (fs, _, handler) = setup(remote);
        fs.add_file("/w/a.txt", b"hi".to_vec());

        handler
            .handle(&record("/w/a.txt", ChangeKind::Modified, Origin::Internal))
            .await
            .unwrap();
        assert_eq!(fs.contents("/w/a.txt").unwrap(), b"hi");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unexpected_response_leaves_file_untouched() {
        let remote = StubRemote::new().with_json(SOURCE, json!({"oops": true}));
        let (fs, ledger, handler) = setup(remote);
        fs.add_file("/w/a.txt", b"hi".to_vec());

        let err = handler
            .handle(&record("/w/a.txt", ChangeKind::Created, Origin::External))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(fs.contents("/w/a.txt").unwrap(), b"hi");
        assert!(ledger.is_empty());
    }
}
