use std::sync::atomic::{AtomicUsize, Ordering};

use hoist_journal::conformance::run_conformance_suite;
use hoist_journal::{FileJournal, MemoryJournal};

#[tokio::test]
async fn memory_journal_conformance() {
    let report = run_conformance_suite(|| async { MemoryJournal::new() }).await;
    assert!(report.failed == 0, "{report}");
    assert!(report.total > 0);
}

#[tokio::test]
async fn file_journal_conformance() {
    let dir = tempfile::tempdir().unwrap();
    let counter = AtomicUsize::new(0);
    let report = run_conformance_suite(|| {
        let path = dir
            .path()
            .join(format!("journal-{}.jsonl", counter.fetch_add(1, Ordering::SeqCst)));
        async move { FileJournal::new(path) }
    })
    .await;
    assert!(report.failed == 0, "{report}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_journal_conformance_multi_thread() {
    let dir = tempfile::tempdir().unwrap();
    let counter = AtomicUsize::new(0);
    let report = run_conformance_suite(|| {
        let path = dir
            .path()
            .join(format!("journal-{}.jsonl", counter.fetch_add(1, Ordering::SeqCst)));
        async move { FileJournal::new(path) }
    })
    .await;
    assert!(report.failed == 0, "{report}");
}
