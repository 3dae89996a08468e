//! Coordinator integration tests.
//!
//! No pdfium library is needed: every test plugs a fake
//! [`ExtractionEngine`] into the real staging, pool and serialization code.
//!
//! Run with:
//!   cargo test --test pipeline

use pdf_extractor::{
    Dispatch, ErrorClass, ExtractError, ExtractionEngine, JobCoordinator, JobOutcome, JobState,
    Notifier, NotifyTarget, OutputFormat, PageRecord, Stage, StagingStore, StructuredResult,
    TableRow, WorkerPool,
};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Three pages; page 2 carries a two-row table.
struct ThreePages;

impl ExtractionEngine for ThreePages {
    fn extract(&self, document: &[u8]) -> Result<StructuredResult, ExtractError> {
        assert!(document.starts_with(b"%PDF"), "engine got the staged bytes");
        Ok(vec![
            PageRecord::new(1, "Quarterly report"),
            PageRecord::new(2, "Prices").with_table(vec![
                TableRow::from_positional(["Item", "Price"]),
                TableRow::from_positional(["Tea", "2.50"]),
            ]),
            PageRecord::new(3, "Appendix"),
        ])
    }
}

struct Corrupt;

impl ExtractionEngine for Corrupt {
    fn extract(&self, _document: &[u8]) -> Result<StructuredResult, ExtractError> {
        Err(ExtractError::CorruptDocument {
            detail: "bad xref table".into(),
        })
    }
}

struct Panicking;

impl ExtractionEngine for Panicking {
    fn extract(&self, _document: &[u8]) -> Result<StructuredResult, ExtractError> {
        panic!("engine blew up");
    }
}

/// Runs work inline and counts how often it was asked to.
#[derive(Default)]
struct CountingPool {
    submitted: AtomicUsize,
}

impl Dispatch for CountingPool {
    fn submit<F, T>(
        &self,
        _stage: Stage,
        work: F,
    ) -> impl Future<Output = Result<T, ExtractError>> + Send
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        async move { Ok(work()) }
    }

    fn capacity(&self) -> usize {
        1
    }

    fn in_flight(&self) -> usize {
        0
    }

    fn is_accepting(&self) -> bool {
        true
    }
}

/// Forwards every outcome to a channel.
struct ChannelNotifier(mpsc::UnboundedSender<(String, JobOutcome)>);

impl Notifier for ChannelNotifier {
    fn notify(&self, target: &NotifyTarget, outcome: &JobOutcome) {
        let _ = self.0.send((target.to_string(), outcome.clone()));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const DOC: &[u8] = b"%PDF-1.7\n%fake body\n%%EOF\n";

async fn setup(
    engine: impl ExtractionEngine + 'static,
) -> (TempDir, JobCoordinator<WorkerPool>) {
    let dir = TempDir::new().unwrap();
    let store = StagingStore::open(dir.path()).await.unwrap();
    let coordinator = JobCoordinator::new(Arc::new(WorkerPool::new(2)), store, Arc::new(engine));
    (dir, coordinator)
}

/// Files currently in `dir`; a missing directory counts as empty.
fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

fn assert_no_leftovers<P: Dispatch>(coordinator: &JobCoordinator<P>) {
    let store = coordinator.store();
    assert_eq!(file_count(store.input_dir()), 0, "uploads/ not empty");
    assert_eq!(file_count(store.output_dir()), 0, "outputs/ not empty");
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_pages_as_json() {
    let (_dir, coordinator) = setup(ThreePages).await;

    let artifact = assert_ok!(coordinator.process(DOC.to_vec(), Some("json"), None).await);
    assert_eq!(artifact.format(), OutputFormat::Json);
    assert_eq!(artifact.content_type(), "application/json");
    assert!(artifact.path().exists());
    assert_eq!(
        artifact.path().file_name().unwrap().to_string_lossy(),
        artifact.file_name()
    );

    let body = artifact.read_to_vec().await.unwrap();
    let pages: Vec<PageRecord> = serde_json::from_slice(&body).unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(
        pages.iter().map(|p| p.page).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(pages[0].tables.is_empty());
    assert_eq!(pages[1].tables.len(), 1);
    assert_eq!(pages[1].tables[0][1].get("1"), Some("2.50"));
    assert!(pages[2].tables.is_empty());

    let job_id = artifact.job_id();
    artifact.release().await;
    assert!(coordinator.store().entries_for(job_id).await.unwrap().is_empty());
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn three_pages_as_csv() {
    let (_dir, coordinator) = setup(ThreePages).await;

    let artifact = coordinator.process(DOC.to_vec(), Some("csv"), None).await.unwrap();
    assert_eq!(artifact.content_type(), "text/csv");
    assert!(artifact.file_name().ends_with(".csv"));

    let body = String::from_utf8(artifact.read_to_vec().await.unwrap()).unwrap();
    assert_eq!(body, "0,1\nItem,Price\nTea,2.50\n");

    artifact.release().await;
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn three_pages_as_txt() {
    let (_dir, coordinator) = setup(ThreePages).await;

    let artifact = coordinator.process(DOC.to_vec(), Some("TXT"), None).await.unwrap();
    let body = String::from_utf8(artifact.read_to_vec().await.unwrap()).unwrap();
    assert!(body.starts_with("--- Page 1 ---\nQuarterly report\n\n--- Page 2 ---"));
    assert!(body.contains("--- Page 3 ---\nAppendix\n"));

    artifact.release().await;
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn format_defaults_to_json() {
    let (_dir, coordinator) = setup(ThreePages).await;
    let artifact = coordinator.process(DOC.to_vec(), None, None).await.unwrap();
    assert_eq!(artifact.format(), OutputFormat::Json);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn extraction_failure_is_classified_and_cleaned() {
    let (_dir, coordinator) = setup(Corrupt).await;

    let err = assert_err!(coordinator.process(DOC.to_vec(), Some("json"), None).await);
    assert!(matches!(err, ExtractError::CorruptDocument { .. }), "got {err:?}");
    assert_eq!(err.class(), ErrorClass::Extraction);
    assert_eq!(err.class().status_code(), 422);
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn unsupported_format_never_stages_or_dispatches() {
    let dir = TempDir::new().unwrap();
    let store = StagingStore::open(dir.path()).await.unwrap();
    let pool = Arc::new(CountingPool::default());
    let coordinator = JobCoordinator::new(Arc::clone(&pool), store, Arc::new(ThreePages));

    let err = coordinator
        .process(DOC.to_vec(), Some("xml"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::UnsupportedFormat(ref f) if f == "xml"));
    assert_eq!(err.class(), ErrorClass::Input);
    assert_eq!(pool.submitted.load(Ordering::SeqCst), 0);
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn each_job_dispatches_two_stages() {
    let dir = TempDir::new().unwrap();
    let store = StagingStore::open(dir.path()).await.unwrap();
    let pool = Arc::new(CountingPool::default());
    let coordinator = JobCoordinator::new(Arc::clone(&pool), store, Arc::new(ThreePages));

    let artifact = coordinator.process(DOC.to_vec(), Some("csv"), None).await.unwrap();
    assert_eq!(pool.submitted.load(Ordering::SeqCst), 2);
    artifact.release().await;
}

#[tokio::test]
async fn serialization_failure_is_classified_and_cleaned() {
    let (_dir, coordinator) = setup(ThreePages).await;
    std::fs::remove_dir_all(coordinator.store().output_dir()).unwrap();

    let err = coordinator
        .process(DOC.to_vec(), Some("csv"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Serialization { .. }), "got {err:?}");
    assert_eq!(err.class(), ErrorClass::Serialization);
    assert_ne!(err.class(), ErrorClass::Extraction);
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn engine_panic_becomes_resource_error() {
    let (_dir, coordinator) = setup(Panicking).await;

    let err = coordinator.process(DOC.to_vec(), None, None).await.unwrap_err();
    match &err {
        ExtractError::WorkerPanicked { stage, detail } => {
            assert_eq!(*stage, Stage::Extract);
            assert!(detail.contains("engine blew up"), "got {detail}");
        }
        other => panic!("expected WorkerPanicked, got {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::Resource);
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn pool_shutdown_rejects_jobs() {
    let (_dir, coordinator) = setup(ThreePages).await;
    coordinator.pool().shutdown().await;
    assert!(!coordinator.health().accepting);

    let err = coordinator.process(DOC.to_vec(), None, None).await.unwrap_err();
    assert!(matches!(err, ExtractError::PoolUnavailable));
    assert_eq!(err.class().status_code(), 503);
    assert_no_leftovers(&coordinator);
}

// ── Cleanup ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dropping_an_artifact_removes_its_files() {
    let (_dir, coordinator) = setup(ThreePages).await;

    let artifact = coordinator.process(DOC.to_vec(), None, None).await.unwrap();
    let path = artifact.path().to_path_buf();
    assert!(path.exists());
    drop(artifact);

    assert!(!path.exists());
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn cleanup_is_idempotent() {
    let (_dir, coordinator) = setup(ThreePages).await;

    let artifact = coordinator.process(DOC.to_vec(), None, None).await.unwrap();
    let job_id = artifact.job_id();
    let paths = vec![
        coordinator.store().input_path(job_id),
        artifact.path().to_path_buf(),
    ];

    // Something else already removed the output.
    std::fs::remove_file(artifact.path()).unwrap();
    artifact.release().await;

    assert_eq!(coordinator.store().remove(&paths).await, 0);
    assert_eq!(coordinator.store().remove(&paths).await, 0);
    assert_no_leftovers(&coordinator);
}

#[tokio::test]
async fn abandoned_job_still_finishes_and_cleans_up() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_dir, coordinator) = setup(ThreePages).await;
    let coordinator = coordinator.with_notifier(Arc::new(ChannelNotifier(tx)));

    let handle = coordinator.spawn(
        DOC.to_vec(),
        OutputFormat::Csv,
        NotifyTarget::parse(Some("http://cb.local/done")),
    );
    drop(handle);

    let (_, outcome) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("job never reached a terminal state")
        .unwrap();
    assert_eq!(outcome.state, JobState::Complete);

    // The unclaimed artifact is dropped right after the notification.
    for _ in 0..100 {
        if coordinator
            .store()
            .entries_for(outcome.job_id)
            .await
            .unwrap()
            .is_empty()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("staged files for {} were never removed", outcome.job_id);
}

// ── Notification ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn notifier_sees_terminal_outcomes() {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (_ok_dir, ok) = setup(ThreePages).await;
    let ok = ok.with_notifier(Arc::new(ChannelNotifier(tx.clone())));
    let artifact = ok
        .process(DOC.to_vec(), Some("txt"), Some("http://cb.local/a"))
        .await
        .unwrap();
    let (target, outcome) = rx.recv().await.unwrap();
    assert_eq!(target, "http://cb.local/a");
    assert!(outcome.is_success());
    assert_eq!(outcome.job_id, artifact.job_id());
    assert_eq!(outcome.format, OutputFormat::Txt);
    artifact.release().await;

    let (_bad_dir, bad) = setup(Corrupt).await;
    let bad = bad.with_notifier(Arc::new(ChannelNotifier(tx)));
    bad.process(DOC.to_vec(), None, Some("http://cb.local/b"))
        .await
        .unwrap_err();
    let (_, outcome) = rx.recv().await.unwrap();
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(outcome.error_class, Some(ErrorClass::Extraction));
    assert!(outcome.error.unwrap().contains("bad xref table"));
}

#[tokio::test]
async fn blank_callback_is_not_notified() {
    let seen = Arc::new(Mutex::new(0usize));

    struct Counter(Arc<Mutex<usize>>);
    impl Notifier for Counter {
        fn notify(&self, _target: &NotifyTarget, _outcome: &JobOutcome) {
            *self.0.lock().unwrap() += 1;
        }
    }

    let (_dir, coordinator) = setup(ThreePages).await;
    let coordinator = coordinator.with_notifier(Arc::new(Counter(Arc::clone(&seen))));
    let artifact = coordinator
        .process(DOC.to_vec(), None, Some("   "))
        .await
        .unwrap();
    artifact.release().await;
    assert_eq!(*seen.lock().unwrap(), 0);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

/// Engine that records how many calls overlap.
#[derive(Clone, Default)]
struct Overlap {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ExtractionEngine for Overlap {
    fn extract(&self, _document: &[u8]) -> Result<StructuredResult, ExtractError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![PageRecord::new(1, "x")])
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_jobs_respect_pool_size() {
    let overlap = Overlap::default();
    let (_dir, coordinator) = setup(overlap.clone()).await;

    let handles: Vec<_> = (0..6)
        .map(|_| coordinator.spawn(DOC.to_vec(), OutputFormat::Json, None))
        .collect();
    for h in handles {
        h.await.unwrap().unwrap().release().await;
    }

    let peak = overlap.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak overlap was {peak}");
    assert_no_leftovers(&coordinator);
}
