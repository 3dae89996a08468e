//! End-to-end job orchestration.
//!
//! [`JobCoordinator`] drives one document through the pipeline:
//!
//! ```text
//! validate format ─▶ stage input ─▶ [pool] extract ─▶ reserve output
//!                                    ─▶ [pool] serialize ─▶ Artifact
//! ```
//!
//! ## Cleanup discipline
//!
//! Every staged path is registered with the job's [`StagedFiles`] guard
//! *before* it is written. On failure the guard is released immediately.
//! On success it travels inside the returned [`Artifact`] and is released
//! once the caller has finished delivering it; if the caller drops the
//! artifact instead (error while streaming, client gone, panic), `Drop`
//! removes the files. Either way each job's files are removed exactly once.
//!
//! ## Detached execution
//!
//! [`JobCoordinator::process`] runs the job on its own Tokio task. If the
//! caller stops waiting, for instance because the HTTP client disconnected,
//! the job still runs to a terminal state, since CPU-bound work is never
//! cancelled half way. The unclaimed artifact is then dropped with the
//! task's output and its files go with it.

use crate::config::ServiceConfig;
use crate::error::ExtractError;
use crate::job::{Job, JobId, JobState, NotifyTarget, Stage};
use crate::notify::{JobOutcome, LogNotifier, NoopNotifier, SharedNotifier};
use crate::output::OutputFormat;
use crate::pipeline::extract::{ExtractionEngine, PdfiumEngine};
use crate::pipeline::serialize::serialize;
use crate::pool::{Dispatch, WorkerPool};
use crate::staging::{StagedFiles, StagingStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Orchestrates jobs over a shared worker pool.
pub struct JobCoordinator<P: Dispatch = WorkerPool> {
    pool: Arc<P>,
    store: StagingStore,
    engine: Arc<dyn ExtractionEngine>,
    notifier: SharedNotifier,
}

impl<P: Dispatch> Clone for JobCoordinator<P> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            store: self.store.clone(),
            engine: Arc::clone(&self.engine),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

/// Snapshot reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolHealth {
    pub accepting: bool,
    pub workers: usize,
    pub in_flight: usize,
}

impl JobCoordinator<WorkerPool> {
    /// Wire up the production stack: a host-sized [`WorkerPool`], the
    /// staging root from `config`, a [`PdfiumEngine`] and a logging notifier.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, ExtractError> {
        let store = StagingStore::open(&config.staging_dir).await?;
        let pool = Arc::new(WorkerPool::new(config.workers));

        let mut engine = PdfiumEngine::from_env();
        if let Some(path) = &config.pdfium_lib_path {
            engine = engine.with_library_path(path);
        }
        if let Some(password) = &config.password {
            engine = engine.with_password(password);
        }

        info!(
            "Coordinator ready: {} workers, staging under {}",
            pool.capacity(),
            config.staging_dir.display()
        );
        Ok(Self::new(pool, store, Arc::new(engine)).with_notifier(Arc::new(LogNotifier)))
    }
}

impl<P: Dispatch> JobCoordinator<P> {
    /// Create a coordinator with a no-op notifier.
    pub fn new(pool: Arc<P>, store: StagingStore, engine: Arc<dyn ExtractionEngine>) -> Self {
        Self {
            pool,
            store,
            engine,
            notifier: Arc::new(NoopNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    pub fn store(&self) -> &StagingStore {
        &self.store
    }

    pub fn health(&self) -> PoolHealth {
        PoolHealth {
            accepting: self.pool.is_accepting(),
            workers: self.pool.capacity(),
            in_flight: self.pool.in_flight(),
        }
    }

    /// Validate the request, then run the job to completion.
    ///
    /// `format` defaults to json. An unrecognised format fails with
    /// [`ExtractError::UnsupportedFormat`] before anything is staged or
    /// dispatched.
    pub async fn process<D>(
        &self,
        document: D,
        format: Option<&str>,
        notify: Option<&str>,
    ) -> Result<Artifact, ExtractError>
    where
        D: AsRef<[u8]> + Send + 'static,
    {
        let format = OutputFormat::from_param(format)?;
        let notify = NotifyTarget::parse(notify);
        self.spawn(document, format, notify)
            .await
            .map_err(|e| ExtractError::Internal(format!("job task failed: {e}")))?
    }

    /// Run a job on its own task.
    ///
    /// Dropping the handle does not cancel the job; an artifact nobody
    /// collects is cleaned up when the task finishes.
    pub fn spawn<D>(
        &self,
        document: D,
        format: OutputFormat,
        notify: Option<NotifyTarget>,
    ) -> JoinHandle<Result<Artifact, ExtractError>>
    where
        D: AsRef<[u8]> + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move { this.run(document.as_ref(), format, notify).await })
    }

    /// Run a job on the current task.
    pub async fn run(
        &self,
        document: &[u8],
        format: OutputFormat,
        notify: Option<NotifyTarget>,
    ) -> Result<Artifact, ExtractError> {
        let start = Instant::now();
        let mut job = Job::admit(format, notify);
        let mut files = StagedFiles::new(job.id);
        info!(job = %job.id, %format, bytes = document.len(), "Job admitted");

        match self.drive(&mut job, &mut files, document).await {
            Ok(path) => {
                job.advance(JobState::Complete);
                info!(
                    job = %job.id,
                    "Job complete in {}ms → {}",
                    start.elapsed().as_millis(),
                    path.display()
                );
                self.report(&job, None);
                Ok(Artifact {
                    job_id: job.id,
                    format,
                    path,
                    files,
                })
            }
            Err(e) => {
                job.advance(JobState::Failed);
                warn!(job = %job.id, class = %e.class(), "Job failed: {}", e);
                files.release().await;
                self.report(&job, Some(&e));
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        job: &mut Job,
        files: &mut StagedFiles,
        document: &[u8],
    ) -> Result<PathBuf, ExtractError> {
        // ── Stage input ──────────────────────────────────────────────────
        files.hold(self.store.input_path(job.id));
        let input = self.store.stage(job.id, document).await?;
        job.advance(JobState::Staged);

        // ── Extract ──────────────────────────────────────────────────────
        job.advance(JobState::Extracting);
        let engine = Arc::clone(&self.engine);
        let pages = self
            .pool
            .submit(Stage::Extract, move || {
                let bytes = std::fs::read(&input).map_err(|e| ExtractError::staging(&input, e))?;
                engine.extract(&bytes)
            })
            .await??;
        debug!(job = %job.id, pages = pages.len(), "extraction finished");

        // ── Serialize ────────────────────────────────────────────────────
        let output = self.store.reserve_output_path(job.id, job.format);
        files.hold(output.clone());
        job.advance(JobState::Serializing);

        let format = job.format;
        let target = output.clone();
        self.pool
            .submit(Stage::Serialize, move || serialize(&pages, format, &target))
            .await??;

        Ok(output)
    }

    fn report(&self, job: &Job, error: Option<&ExtractError>) {
        let Some(target) = job.notify.as_ref() else {
            return;
        };
        let outcome = JobOutcome {
            job_id: job.id,
            format: job.format,
            state: job.state(),
            error_class: error.map(ExtractError::class),
            error: error.map(ToString::to_string),
        };
        self.notifier.notify(target, &outcome);
    }
}

/// A completed job's output file, owned until delivered.
///
/// Call [`Artifact::release`] when delivery is finished. Dropping the
/// artifact also removes the job's staged files.
#[derive(Debug)]
pub struct Artifact {
    job_id: JobId,
    format: OutputFormat,
    path: PathBuf,
    files: StagedFiles,
}

impl Artifact {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Suggested download name, e.g. `{job_id}.csv`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.job_id, self.format.extension())
    }

    pub async fn open(&self) -> Result<tokio::fs::File, ExtractError> {
        tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| ExtractError::staging(&self.path, e))
    }

    pub async fn read_to_vec(&self) -> Result<Vec<u8>, ExtractError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| ExtractError::staging(&self.path, e))
    }

    /// Remove the job's staged input and output.
    pub async fn release(self) {
        self.files.release().await;
    }
}
