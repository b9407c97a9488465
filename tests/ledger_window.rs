// tests/ledger_window.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pollwatch::watch::SelfModificationLedger;

#[tokio::test(start_paused = true)]
async fn marks_expire_exactly_at_the_window() {
    let ledger = SelfModificationLedger::new(Duration::from_secs(10));
    ledger.mark_self_modified("/w/a.txt");

    tokio::time::advance(Duration::from_millis(9_999)).await;
    assert!(ledger.was_self_modified(Path::new("/w/a.txt")));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(!ledger.was_self_modified(Path::new("/w/a.txt")));
    assert!(ledger.is_empty());
}

#[tokio::test(start_paused = true)]
async fn marking_again_restarts_the_window() {
    let ledger = SelfModificationLedger::new(Duration::from_secs(10));
    ledger.mark_self_modified("/w/a.txt");

    tokio::time::advance(Duration::from_secs(8)).await;
    ledger.mark_self_modified("/w/a.txt");

    tokio::time::advance(Duration::from_secs(8)).await;
    assert!(ledger.was_self_modified(Path::new("/w/a.txt")));
    assert!(!ledger.was_self_modified(Path::new("/w/b.txt")));
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_swept_by_later_marks() {
    let ledger = SelfModificationLedger::new(Duration::from_secs(10));
    for i in 0..5 {
        ledger.mark_self_modified(format!("/w/old-{i}"));
    }
    assert_eq!(ledger.len(), 5);

    tokio::time::advance(Duration::from_secs(11)).await;
    ledger.mark_self_modified("/w/new");
    assert_eq!(ledger.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_marks_and_checks_are_consistent() {
    let ledger = Arc::new(SelfModificationLedger::new(Duration::from_secs(60)));

    let tasks: Vec<_> = (0..8)
        .map(|worker| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                for i in 0..100 {
                    let path = format!("/w/{worker}/{i}");
                    ledger.mark_self_modified(path.as_str());
                    assert!(ledger.was_self_modified(Path::new(&path)));
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(ledger.len(), 800);
}
