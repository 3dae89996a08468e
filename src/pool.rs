//! Bounded worker pool for CPU-bound stages.
//!
//! ## Why spawn_blocking behind a semaphore?
//!
//! pdfium parsing and artifact encoding are blocking, CPU-heavy calls. Run
//! on a Tokio worker thread they would stall every request the runtime is
//! serving. `tokio::task::spawn_blocking` moves them to the blocking thread
//! pool, but that pool is deliberately large (hundreds of threads), so on
//! its own it provides no ceiling at all. A semaphore with one permit per
//! CPU turns it into a fixed number of execution slots.
//!
//! The ceiling is the service's only admission control. Work that cannot
//! get a slot waits for one; nothing is rejected for being busy. Only a
//! pool that is shutting down refuses work, with
//! [`ExtractError::PoolUnavailable`].
//!
//! The permit travels *into* the blocking closure, so a slot stays occupied
//! until the work actually finishes, even if the task that submitted it
//! stops waiting.

use crate::error::ExtractError;
use crate::job::Stage;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Runs blocking units of work on behalf of the job coordinator.
///
/// [`WorkerPool`] is the production implementation; tests substitute a
/// deterministic fake.
pub trait Dispatch: Send + Sync + 'static {
    /// Run `work` on a pooled execution context and return its value.
    fn submit<F, T>(
        &self,
        stage: Stage,
        work: F,
    ) -> impl Future<Output = Result<T, ExtractError>> + Send
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;

    /// Number of execution slots.
    fn capacity(&self) -> usize;

    /// Slots currently occupied.
    fn in_flight(&self) -> usize;

    /// `false` once shutdown has begun.
    fn is_accepting(&self) -> bool;
}

/// Fixed-size pool of blocking execution slots.
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    draining: AtomicBool,
}

impl WorkerPool {
    /// Create a pool with `capacity` slots (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, u32::MAX as usize);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            draining: AtomicBool::new(false),
        }
    }

    /// One slot per logical CPU on this host.
    pub fn from_host() -> Self {
        Self::new(num_cpus::get())
    }

    /// Stop admitting work and wait for in-flight work to finish.
    ///
    /// Submissions made after this call fail with
    /// [`ExtractError::PoolUnavailable`]. Calling it twice is harmless.
    pub async fn shutdown(&self) {
        if self.draining.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            "Worker pool draining ({} of {} slots busy)",
            self.in_flight(),
            self.capacity
        );
        // Holding every permit means nothing is running any more.
        match self.permits.acquire_many(self.capacity as u32).await {
            Ok(all) => {
                self.permits.close();
                drop(all);
            }
            Err(_) => self.permits.close(),
        }
        info!("Worker pool shut down");
    }
}

impl Dispatch for WorkerPool {
    async fn submit<F, T>(&self, stage: Stage, work: F) -> Result<T, ExtractError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.draining.load(Ordering::Acquire) {
            return Err(ExtractError::PoolUnavailable);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ExtractError::PoolUnavailable)?;
        debug!(%stage, in_flight = self.in_flight(), "dispatching to worker");

        tokio::task::spawn_blocking(move || {
            let _slot = permit;
            work()
        })
        .await
        .map_err(|e| {
            let detail = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            error!(%stage, "worker failed: {}", detail);
            ExtractError::WorkerPanicked { stage, detail }
        })
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn in_flight(&self) -> usize {
        self.capacity
            .saturating_sub(self.permits.available_permits())
    }

    fn is_accepting(&self) -> bool {
        !self.draining.load(Ordering::Acquire) && !self.permits.is_closed()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
