// src/engine/runtime.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::dispatch::DispatchBackend;
use crate::errors::{PollwatchError, Result};
use crate::fs::FileSystem;
use crate::watch::scanner::{ScanError, Scanner};
use crate::watch::snapshot::Snapshot;

use super::core::WatchCore;
use super::RuntimeOptions;

/// Polling loop around [`WatchCore`].
///
/// Once per tick it scans every root on a blocking worker thread, feeds the
/// results through the core, and forwards the resulting records to a
/// [`DispatchBackend`]. Handlers never run on this task, so a slow handler
/// cannot delay the next tick.
pub struct Runtime<D: DispatchBackend> {
    core: WatchCore,
    scanner: Arc<Scanner>,
    fs: Arc<dyn FileSystem>,
    roots: Vec<PathBuf>,
    options: RuntimeOptions,
    dispatcher: D,
    shutdown_rx: oneshot::Receiver<()>,
}

impl<D: DispatchBackend> fmt::Debug for Runtime<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("roots", &self.roots)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<D: DispatchBackend> Runtime<D> {
    pub fn new(
        core: WatchCore,
        scanner: Scanner,
        fs: Arc<dyn FileSystem>,
        roots: Vec<PathBuf>,
        options: RuntimeOptions,
        dispatcher: D,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            core,
            scanner: Arc::new(scanner),
            fs,
            roots,
            options,
            dispatcher,
            shutdown_rx,
        }
    }

    /// Main polling loop.
    ///
    /// - Creates missing roots and takes the baseline snapshots.
    /// - Ticks every `tick_interval` until shutdown is requested or
    ///   `max_ticks` is reached.
    /// - Scan failures are logged inside the core and never end the loop.
    pub async fn run(mut self) -> Result<()> {
        self.prepare_roots().await?;
        info!(roots = ?self.roots, "pollwatch runtime started");

        let period = self.options.tick_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks: u64 = 0;
        let mut shutdown_armed = true;

        loop {
            if self.options.max_ticks.is_some_and(|max| ticks >= max) {
                info!(ticks, "tick limit reached; stopping runtime");
                break;
            }

            tokio::select! {
                res = &mut self.shutdown_rx, if shutdown_armed => {
                    match res {
                        Ok(()) => {
                            info!("shutdown requested; stopping runtime");
                            break;
                        }
                        Err(_) => {
                            // Nobody can ask us to stop any more; keep polling.
                            debug!("shutdown sender dropped");
                            shutdown_armed = false;
                        }
                    }
                }
                _ = interval.tick() => {
                    ticks += 1;
                    self.tick(ticks).await?;
                }
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    /// One pass over every root.
    async fn tick(&mut self, tick: u64) -> Result<()> {
        let Some(scans) = self.scan_all().await else {
            error!(tick, "scan worker failed; skipping tick");
            return Ok(());
        };

        let now = Instant::now();
        for (root, scan) in scans {
            let step = self.core.step(&root, scan, now);

            if step.recreate_root {
                self.create_root(&root);
            }

            if !step.records.is_empty() {
                debug!(
                    tick,
                    root = ?root,
                    count = step.records.len(),
                    "dispatching change records"
                );
                self.dispatcher.dispatch(step.records).await?;
            }
        }

        Ok(())
    }

    /// Create missing roots, canonicalize them, and store baselines.
    async fn prepare_roots(&mut self) -> Result<()> {
        let mut prepared: Vec<PathBuf> = Vec::with_capacity(self.roots.len());

        for root in std::mem::take(&mut self.roots) {
            if !self.fs.is_dir(&root) {
                warn!(root = ?root, "watched root does not exist; creating it");
                self.create_root(&root);
            }

            let root = self.fs.canonicalize(&root).unwrap_or(root);
            if prepared.contains(&root) {
                warn!(root = ?root, "root listed more than once; watching it once");
                continue;
            }
            prepared.push(root);
        }

        if prepared.is_empty() {
            return Err(PollwatchError::ConfigError(
                "no watched roots configured".to_string(),
            ));
        }
        self.roots = prepared;

        let scans = self
            .scan_all()
            .await
            .ok_or_else(|| anyhow::anyhow!("baseline scan worker failed"))?;

        for (root, scan) in scans {
            match scan {
                Ok(snapshot) => self.core.baseline(&root, snapshot),
                // The first successful scan in the loop becomes the baseline.
                Err(err) => warn!(root = ?root, error = %err, "baseline scan failed"),
            }
        }

        Ok(())
    }

    /// Scan every root on the blocking pool. `None` if the worker panicked.
    async fn scan_all(&self) -> Option<Vec<(PathBuf, std::result::Result<Snapshot, ScanError>)>> {
        let scanner = Arc::clone(&self.scanner);
        let roots = self.roots.clone();

        tokio::task::spawn_blocking(move || {
            roots
                .into_iter()
                .map(|root| {
                    let scan = scanner.scan(&root);
                    (root, scan)
                })
                .collect()
        })
        .await
        .ok()
    }

    fn create_root(&self, root: &Path) {
        if let Err(err) = self.fs.create_dir_all(root) {
            error!(root = ?root, error = %err, "failed to create watched root");
        }
    }
}
