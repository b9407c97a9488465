// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod handlers;
pub mod logging;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_with_overrides, ConfigFile, HandlerToggle};
use crate::dispatch::{EventPublisher, HandlerRegistry, RealDispatchBackend};
use crate::engine::{Runtime, RuntimeOptions, WatchCore};
use crate::fs::{FileSystem, RealFileSystem};
use crate::handlers::{build_registry, HttpRemote, RemoteClient};
use crate::watch::{LoopbackFilter, Scanner, SelfModificationLedger};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (with `--root` overrides)
/// - ledger, handler registry and publisher
/// - scanner, pure core and polling runtime
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_with_overrides(&args.config, &args.roots)?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let ledger = Arc::new(SelfModificationLedger::new(cfg.watch.suppression_window));
    let remote: Arc<dyn RemoteClient> = Arc::new(HttpRemote::default());
    let registry = build_registry(&cfg.handlers, Arc::clone(&fs), ledger.handle(), remote);

    if args.dry_run {
        print_dry_run(&cfg, &registry);
        return Ok(());
    }

    let publisher = Arc::new(EventPublisher::new(registry));
    let (dispatcher, dispatch_worker) = RealDispatchBackend::spawn(Arc::clone(&publisher));

    let scanner = Scanner::new(Arc::clone(&fs), cfg.watch.limits, cfg.watch.exclude.clone());
    let core = WatchCore::new(LoopbackFilter::new(Arc::clone(&ledger)));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    let options = RuntimeOptions {
        tick_interval: cfg.watch.tick_interval,
        max_ticks: args.ticks,
    };

    let runtime = Runtime::new(
        core,
        scanner,
        fs,
        cfg.watch.roots.clone(),
        options,
        dispatcher,
        shutdown_rx,
    );
    runtime.run().await?;

    // A bounded run lets queued records and retries finish; an interrupted
    // one does not wait.
    if args.ticks.is_some() {
        info!("waiting for queued records and retries to finish");
        tokio::select! {
            _ = dispatch_worker => {}
            _ = tokio::signal::ctrl_c() => warn!("interrupted while draining"),
        }
    }

    let problems = publisher.problems().entries_sorted();
    if !problems.is_empty() {
        warn!(count = problems.len(), "records on the problem list at exit");
        for p in problems {
            debug!(handler = %p.handler, path = ?p.path, "problem entry");
        }
    }

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            warn!(error = %e, "failed to listen for Ctrl+C");
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        // Without a signal source, keep running until the process is killed.
        std::future::pending::<()>().await;
    }
}

fn describe_retry(toggle: &HandlerToggle) -> String {
    match &toggle.retry {
        Some(policy) => format!(
            "{} attempts, backoff {:?}",
            policy.max_attempts, policy.backoff
        ),
        None => "no retries".to_string(),
    }
}

/// Simple dry-run output: print the effective settings and handlers.
fn print_dry_run(cfg: &ConfigFile, registry: &HandlerRegistry) {
    let watch = &cfg.watch;
    println!("pollwatch dry-run");
    println!("  watch.tick_interval = {:?}", watch.tick_interval);
    println!("  watch.suppression_window = {:?}", watch.suppression_window);
    println!("  watch.max_depth = {}", watch.limits.max_depth);
    println!("  watch.max_files = {}", watch.limits.max_files);
    if !watch.exclude_patterns.is_empty() {
        println!("  watch.exclude = {:?}", watch.exclude_patterns);
    }
    println!();

    println!("roots ({}):", watch.roots.len());
    for root in &watch.roots {
        println!("  - {}", root.display());
    }
    println!();

    let handlers = &cfg.handlers;
    let toggles = [
        ("log", &handlers.log),
        ("image", &handlers.image.toggle),
        ("json", &handlers.json.toggle),
        ("text", &handlers.text.toggle),
        ("archive", &handlers.archive.toggle),
        ("replace", &handlers.replace.toggle),
    ];

    println!("handlers ({} enabled):", registry.len());
    for (name, toggle) in toggles {
        if toggle.enabled {
            println!("  - {name}: {}", describe_retry(toggle));
        } else {
            println!("  - {name}: disabled");
        }
    }

    debug!("dry-run complete (nothing watched)");
}
