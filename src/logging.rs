// src/logging.rs

//! `tracing` subscriber for the binary.
//!
//! The filter comes from `--log-level` when given, otherwise from the
//! `POLLWATCH_LOG` directives (same syntax as `RUST_LOG`, e.g.
//! `info,pollwatch::dispatch=debug`). Without either, pollwatch logs at
//! `info` and the HTTP stack only at `warn`.
//!
//! Output goes to stderr; stdout is reserved for `--dry-run`.

use anyhow::anyhow;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "POLLWATCH_LOG";

/// Keeps per-request chatter from the HTTP client out of `info`/`debug`.
const QUIET_DEPS: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

pub fn init_logging(cli_level: Option<LogLevel>) -> anyhow::Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let (filter, rejected) = resolve_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;

    if let Some(err) = rejected {
        tracing::warn!(var = LOG_ENV, error = %err, "ignoring unparsable log filter");
    }
    Ok(())
}

/// The filter to install, plus the parse error if `env` had to be ignored.
fn resolve_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (with_quiet_deps(level_filter(level)), None);
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => match EnvFilter::try_new(directives) {
            Ok(filter) => (filter, None),
            Err(err) => (with_quiet_deps(LevelFilter::INFO), Some(err.to_string())),
        },
        None => (with_quiet_deps(LevelFilter::INFO), None),
    }
}

fn with_quiet_deps(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(QUIET_DEPS)
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}
