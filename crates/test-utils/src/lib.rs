//! Shared fixtures for pollwatch's integration tests: recording and failing
//! handlers, a dispatch backend that publishes inline, a scripted remote,
//! and config/record builders.

pub mod builders;
pub mod fake_dispatcher;
pub mod fake_remote;
pub mod handlers;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Upper bound for [`with_timeout`]. Under a paused clock this is virtual
/// time, so it only trips on a real hang.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Install a test-writer subscriber once per test binary.
///
/// Honours `POLLWATCH_LOG`, then `RUST_LOG`; defaults to `info`. Output is
/// captured and only shown for failing tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var(pollwatch::logging::LOG_ENV)
            .ok()
            .and_then(|d| EnvFilter::try_new(d).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(out) => out,
        Err(_) => panic!("timed out after {TEST_TIMEOUT:?}"),
    }
}
