//! Job-completion notification capability.
//!
//! A caller may attach a notification target (typically a callback URL) to
//! a job. The coordinator reports every terminal outcome to the injected
//! [`Notifier`] when a target is present. Actually dispatching the
//! notification is outside this crate's scope: [`NoopNotifier`] is the
//! default and [`LogNotifier`] records the intent in the logs.
//!
//! # Example
//!
//! ```rust
//! use pdf_extractor::{JobOutcome, Notifier, NotifyTarget};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct Counting(AtomicUsize);
//!
//! impl Notifier for Counting {
//!     fn notify(&self, _target: &NotifyTarget, _outcome: &JobOutcome) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::error::ErrorClass;
use crate::job::{JobId, JobState, NotifyTarget};
use crate::output::OutputFormat;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Terminal outcome of one job, as reported to a [`Notifier`].
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub format: OutputFormat,
    /// Either [`JobState::Complete`] or [`JobState::Failed`].
    pub state: JobState,
    /// Failure class, when the job failed.
    pub error_class: Option<ErrorClass>,
    /// Failure message, when the job failed.
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.state == JobState::Complete
    }
}

/// Receives terminal job outcomes.
///
/// Implementations must be `Send + Sync`; jobs finish concurrently on
/// different tasks. `notify` is called on the job's task and should return
/// quickly.
pub trait Notifier: Send + Sync {
    fn notify(&self, target: &NotifyTarget, outcome: &JobOutcome);
}

/// Does nothing. The default.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _target: &NotifyTarget, _outcome: &JobOutcome) {}
}

/// Logs that a notification would have been sent.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, target: &NotifyTarget, outcome: &JobOutcome) {
        info!(
            job = %outcome.job_id,
            state = ?outcome.state,
            "Would callback to {} for job {}",
            target,
            outcome.job_id
        );
    }
}

/// Shared handle stored by the coordinator.
pub type SharedNotifier = Arc<dyn Notifier>;
