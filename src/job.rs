//! Job identity and lifecycle.
//!
//! ```text
//! Admitted ──▶ Staged ──▶ Extracting ──▶ Serializing ──▶ Complete
//!     │          │            │               │
//!     └──────────┴────────────┴───────────────┴──────▶ Failed
//! ```
//!
//! States only move forward; a failure anywhere is terminal.

use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Globally unique job identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Admitted,
    Staged,
    Extracting,
    Serializing,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

/// CPU-bound stage dispatched to the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Serialize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extract => "extract",
            Stage::Serialize => "serialize",
        })
    }
}

/// Where to report a finished job. Opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifyTarget(String);

impl NotifyTarget {
    /// Returns `None` for an empty or whitespace-only target.
    pub fn parse(raw: Option<impl Into<String>>) -> Option<Self> {
        let raw = raw?.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotifyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Book-keeping for one job as it moves through the coordinator.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub format: OutputFormat,
    pub notify: Option<NotifyTarget>,
    state: JobState,
}

impl Job {
    pub fn admit(format: OutputFormat, notify: Option<NotifyTarget>) -> Self {
        let id = JobId::new();
        debug!(job = %id, %format, "admitted");
        Self {
            id,
            format,
            notify,
            state: JobState::Admitted,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`. Transitions out of a terminal state are ignored.
    pub fn advance(&mut self, next: JobState) {
        if self.state.is_terminal() {
            debug!(job = %self.id, from = ?self.state, to = ?next, "ignoring transition out of terminal state");
            return;
        }
        debug_assert!(
            next > self.state,
            "job states only move forward ({:?} -> {:?})",
            self.state,
            next
        );
        debug!(job = %self.id, from = ?self.state, to = ?next, "transition");
        self.state = next;
    }
}
