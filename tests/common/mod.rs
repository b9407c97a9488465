#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pollwatch::dispatch::{EventPublisher, HandlerRegistry};
use pollwatch::engine::{ChangeRecord, Runtime, RuntimeOptions, WatchCore};
use pollwatch::fs::mock::MockFileSystem;
use pollwatch::fs::FileSystem;
use pollwatch::watch::{LoopbackFilter, ScanLimits, Scanner, SelfModificationLedger};
use pollwatch_test_utils::fake_dispatcher::FakeDispatcher;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub use pollwatch_test_utils::init_tracing;

pub const TICK: Duration = Duration::from_secs(1);
pub const WINDOW: Duration = Duration::from_secs(10);

/// A runtime over a mock filesystem, spawned on the current (paused) Tokio
/// runtime. Ticks fire at 1s, 2s, 3s... after the baseline scan at t=0.
pub struct Harness {
    pub fs: MockFileSystem,
    pub ledger: Arc<SelfModificationLedger>,
    pub publisher: Arc<EventPublisher>,
    pub dispatched: Arc<Mutex<Vec<ChangeRecord>>>,
    pub shutdown: Option<oneshot::Sender<()>>,
    pub task: JoinHandle<pollwatch::errors::Result<()>>,
}

impl Harness {
    pub fn start(
        fs: MockFileSystem,
        roots: &[&str],
        max_ticks: Option<u64>,
        registry: impl FnOnce(&Arc<SelfModificationLedger>) -> HandlerRegistry,
    ) -> Self {
        let ledger = Arc::new(SelfModificationLedger::new(WINDOW));
        let publisher = Arc::new(EventPublisher::new(registry(&ledger)));
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = FakeDispatcher::publishing(Arc::clone(&dispatched), Arc::clone(&publisher));

        let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
        let scanner = Scanner::new(Arc::clone(&shared), ScanLimits::default(), None);
        let core = WatchCore::new(LoopbackFilter::new(Arc::clone(&ledger)));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let runtime = Runtime::new(
            core,
            scanner,
            shared,
            roots.iter().map(PathBuf::from).collect(),
            RuntimeOptions {
                tick_interval: TICK,
                max_ticks,
            },
            dispatcher,
            shutdown_rx,
        );

        Self {
            fs,
            ledger,
            publisher,
            dispatched,
            shutdown: Some(shutdown_tx),
            task: tokio::spawn(runtime.run()),
        }
    }

    /// Records dispatched so far, as `(path, kind, origin)` strings.
    pub fn summary(&self) -> Vec<(String, &'static str, &'static str)> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .map(|r| {
                (
                    r.path.to_string_lossy().into_owned(),
                    r.kind.as_str(),
                    r.origin.as_str(),
                )
            })
            .collect()
    }

    /// Wait for the runtime to stop on its own (tick limit or shutdown).
    pub async fn join(&mut self) -> pollwatch::errors::Result<()> {
        (&mut self.task).await.expect("runtime task panicked")
    }

    pub fn take(&self) -> Vec<(String, &'static str, &'static str)> {
        let out = self.summary();
        self.dispatched.lock().unwrap().clear();
        out
    }
}

/// Sleep until just past the given tick (tick `n` fires at `n` seconds).
pub async fn after_tick(start: tokio::time::Instant, n: u64) {
    tokio::time::sleep_until(start + TICK * n as u32 + Duration::from_millis(500)).await;
}

pub fn entry(path: &str, kind: &'static str, origin: &'static str) -> (String, &'static str, &'static str) {
    (path.to_string(), kind, origin)
}

pub fn root_path(root: &str) -> &Path {
    Path::new(root)
}
