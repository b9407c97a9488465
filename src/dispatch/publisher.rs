// src/dispatch/publisher.rs

//! Delivers change records to the registered handlers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatch::handler::{Handler, HandlerError};
use crate::dispatch::registry::{HandlerRegistration, HandlerRegistry};
use crate::dispatch::retry::{ProblemKey, ProblemList, RetryPolicy};
use crate::engine::ChangeRecord;

/// Counts from one `publish` call (first attempts only; retries run later).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Outcome of the first attempt to deliver one record to one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Succeeded,
    Failed,
    Skipped,
}

/// Invokes every registered handler, in registration order, for each
/// record.
///
/// Each invocation runs on its own Tokio task so a panic is contained the
/// same way an error is. A failure never stops later handlers from seeing
/// the record. Transient failures of handlers with a retry policy are
/// retried on a separate task, so waiting out a backoff does not hold up
/// other handlers or later records.
#[derive(Debug)]
pub struct EventPublisher {
    registry: HandlerRegistry,
    problems: Arc<ProblemList>,
    retries: Mutex<Vec<JoinHandle<()>>>,
}

impl EventPublisher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self::with_problem_list(registry, Arc::new(ProblemList::new()))
    }

    pub fn with_problem_list(registry: HandlerRegistry, problems: Arc<ProblemList>) -> Self {
        Self {
            registry,
            problems,
            retries: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn problems(&self) -> &Arc<ProblemList> {
        &self.problems
    }

    fn retries(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.retries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `record` to every handler.
    pub async fn publish(&self, record: ChangeRecord) -> PublishSummary {
        let record = Arc::new(record);
        let mut summary = PublishSummary::default();

        for registration in self.registry.iter() {
            match self.deliver(registration, Arc::clone(&record)).await {
                Delivery::Succeeded => summary.succeeded += 1,
                Delivery::Failed => summary.failed += 1,
                Delivery::Skipped => summary.skipped += 1,
            }
        }

        summary
    }

    /// Deliver `record` to a single handler behind the failure boundary.
    ///
    /// A failure is logged and, when the registration allows it, retried in
    /// the background; the returned outcome reflects the first attempt.
    pub async fn deliver(
        &self,
        registration: &HandlerRegistration,
        record: Arc<ChangeRecord>,
    ) -> Delivery {
        let key = ProblemKey::new(registration.name(), &record);
        if self.problems.contains(&key) {
            debug!(
                handler = registration.name(),
                path = ?record.path,
                "state is on the problem list; not invoking handler"
            );
            return Delivery::Skipped;
        }

        match invoke(Arc::clone(&registration.handler), Arc::clone(&record)).await {
            Ok(()) => Delivery::Succeeded,
            Err(err) => {
                self.handle_failure(registration, record, err);
                Delivery::Failed
            }
        }
    }

    /// Wait for every retry scheduled so far to finish.
    pub async fn join_retries(&self) {
        loop {
            let pending = std::mem::take(&mut *self.retries());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(err) = handle.await {
                    error!(error = %err, "retry task ended abnormally");
                }
            }
        }
    }

    /// Number of retry tasks that have not finished yet.
    pub fn pending_retries(&self) -> usize {
        let mut retries = self.retries();
        retries.retain(|h| !h.is_finished());
        retries.len()
    }

    fn handle_failure(
        &self,
        registration: &HandlerRegistration,
        record: Arc<ChangeRecord>,
        err: HandlerError,
    ) {
        let name = registration.name();

        match &registration.retry {
            Some(policy) if err.is_transient() && policy.allows_another(1) => {
                let delay = policy.delay_after(1);
                warn!(
                    handler = name,
                    path = ?record.path,
                    error = %err,
                    retry_in = ?delay,
                    "handler failed; scheduling retry"
                );
                let task = tokio::spawn(retry_until_exhausted(
                    Arc::clone(&registration.handler),
                    policy.clone(),
                    record,
                    Arc::clone(&self.problems),
                ));
                let mut retries = self.retries();
                retries.retain(|h| !h.is_finished());
                retries.push(task);
            }
            _ => {
                error!(handler = name, path = ?record.path, error = %err, "handler failed");
                mark_problem(&self.problems, name, &record, 1);
            }
        }
    }
}

/// Run one handler invocation inside its own task.
async fn invoke(handler: Arc<dyn Handler>, record: Arc<ChangeRecord>) -> Result<(), HandlerError> {
    let name = handler.name().to_string();
    let task = tokio::spawn(async move { handler.handle(&record).await });

    match task.await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            Err(HandlerError::fatal(format!("handler '{name}' panicked")))
        }
        Err(join_err) => Err(HandlerError::fatal(format!(
            "handler '{name}' was cancelled: {join_err}"
        ))),
    }
}

/// Attempts 2..=max_attempts, each preceded by its backoff delay.
async fn retry_until_exhausted(
    handler: Arc<dyn Handler>,
    policy: RetryPolicy,
    record: Arc<ChangeRecord>,
    problems: Arc<ProblemList>,
) {
    let name = handler.name().to_string();
    let mut attempt: u32 = 1;

    loop {
        tokio::time::sleep(policy.delay_after(attempt)).await;
        attempt += 1;

        match invoke(Arc::clone(&handler), Arc::clone(&record)).await {
            Ok(()) => {
                info!(handler = %name, path = ?record.path, attempt, "handler succeeded on retry");
                return;
            }
            Err(err) if err.is_transient() && policy.allows_another(attempt) => {
                warn!(
                    handler = %name,
                    path = ?record.path,
                    attempt,
                    error = %err,
                    "retry failed; trying again"
                );
            }
            Err(err) => {
                error!(
                    handler = %name,
                    path = ?record.path,
                    attempt,
                    error = %err,
                    "handler gave up on record"
                );
                mark_problem(&problems, &name, &record, attempt);
                return;
            }
        }
    }
}

fn mark_problem(problems: &ProblemList, handler: &str, record: &ChangeRecord, attempts: u32) {
    if problems.record(ProblemKey::new(handler, record)) {
        warn!(
            handler,
            path = ?record.path,
            attempts,
            "added to problem list; will not be retried"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler::HandlerFuture;
    use crate::types::{ChangeKind, Origin};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, UNIX_EPOCH};

    fn record(path: &str) -> ChangeRecord {
        ChangeRecord {
            path: PathBuf::from(path),
            kind: ChangeKind::Created,
            origin: Origin::External,
            mtime: UNIX_EPOCH + Duration::from_secs(1),
        }
    }

    /// Fails the first `failures` calls with `error`, then succeeds.
    struct Scripted {
        name: &'static str,
        failures: u32,
        error: HandlerError,
        calls: AtomicU32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Scripted {
        fn new(name: &'static str, failures: u32, error: HandlerError) -> Arc<Self> {
            Self::logging(name, failures, error, Arc::new(Mutex::new(Vec::new())))
        }

        fn logging(
            name: &'static str,
            failures: u32,
            error: HandlerError,
            log: Arc<Mutex<Vec<&'static str>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                failures,
                error,
                calls: AtomicU32::new(0),
                log,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Handler for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn handle<'a>(&'a self, _record: &'a ChangeRecord) -> HandlerFuture<'a> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.name);
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= self.failures {
                    Err(self.error.clone())
                } else {
                    Ok(())
                }
            })
        }
    }

    struct Panics;

    impl Handler for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        #[allow(unreachable_code)]
        fn handle<'a>(&'a self, _record: &'a ChangeRecord) -> HandlerFuture<'a> {
            Box::pin(async move {
                panic!("handler bug");
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order_despite_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = Scripted::logging("first", 1, HandlerError::fatal("nope"), Arc::clone(&log));
        let second = Scripted::logging("second", 0, HandlerError::fatal("unused"), Arc::clone(&log));

        let mut registry = HandlerRegistry::new();
        registry.register(first.clone()).register(second.clone());
        let publisher = EventPublisher::new(registry);

        let summary = publisher.publish(record("/w/a")).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(publisher.problems().len(), 1);
    }

    #[tokio::test]
    async fn a_panicking_handler_is_contained() {
        let after = Scripted::new("after", 0, HandlerError::fatal("unused"));
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Panics)).register(after.clone());
        let publisher = EventPublisher::new(registry);

        let summary = publisher.publish(record("/w/a")).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(after.calls(), 1);
        assert!(
            publisher
                .problems()
                .contains(&ProblemKey::new("panics", &record("/w/a")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let flaky = Scripted::new("flaky", 2, HandlerError::transient("busy"));
        let policy = RetryPolicy::new(3, vec![Duration::from_secs(5), Duration::from_secs(15)]);
        let mut registry = HandlerRegistry::new();
        registry.register_with_retry(flaky.clone(), policy);
        let publisher = EventPublisher::new(registry);

        let started = tokio::time::Instant::now();
        publisher.publish(record("/w/a")).await;
        assert_eq!(flaky.calls(), 1);

        publisher.join_retries().await;

        assert_eq!(flaky.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(publisher.problems().is_empty());
        assert_eq!(publisher.pending_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_land_on_the_problem_list_once() {
        let broken = Scripted::new("broken", u32::MAX, HandlerError::transient("down"));
        let mut registry = HandlerRegistry::new();
        registry.register_with_retry(broken.clone(), RetryPolicy::new(3, vec![Duration::from_secs(1)]));
        let publisher = EventPublisher::new(registry);

        publisher.publish(record("/w/a")).await;
        publisher.join_retries().await;

        assert_eq!(broken.calls(), 3);
        assert_eq!(publisher.problems().len(), 1);

        // Same state again: skipped without invoking the handler.
        let summary = publisher.publish(record("/w/a")).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(broken.calls(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let fatal = Scripted::new("fatal", u32::MAX, HandlerError::fatal("bad input"));
        let mut registry = HandlerRegistry::new();
        registry.register_with_retry(fatal.clone(), RetryPolicy::new(5, vec![Duration::ZERO]));
        let publisher = EventPublisher::new(registry);

        publisher.publish(record("/w/a")).await;
        publisher.join_retries().await;

        assert_eq!(fatal.calls(), 1);
        assert_eq!(publisher.problems().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_retry_tasks_do_not_accumulate() {
        let broken = Scripted::new("broken", u32::MAX, HandlerError::transient("down"));
        let mut registry = HandlerRegistry::new();
        registry.register_with_retry(broken.clone(), RetryPolicy::new(2, vec![Duration::from_secs(1)]));
        let publisher = EventPublisher::new(registry);

        for i in 0..50 {
            publisher.publish(record(&format!("/w/{i}"))).await;
        }
        assert_eq!(publisher.retries.lock().unwrap().len(), 50);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(broken.calls(), 100);

        publisher.publish(record("/w/late")).await;
        assert_eq!(publisher.retries.lock().unwrap().len(), 1);

        publisher.join_retries().await;
        assert_eq!(publisher.problems().len(), 51);
    }
}
