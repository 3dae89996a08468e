//! # pdf-extractor
//!
//! A small service that turns uploaded PDFs into structured data: page text
//! plus detected tables, delivered as JSON, CSV or plain text.
//!
//! ## Why a worker pool?
//!
//! PDF parsing is CPU-bound and blocking. Running it on the async runtime
//! would stall every other request. Each job's extraction and serialization
//! run on a fixed-size [`WorkerPool`] instead, which is also the only
//! admission control: with N workers, at most N documents are parsed at
//! once and everything else waits for a slot.
//!
//! ## Job Lifecycle
//!
//! ```text
//! POST /extract
//!  │
//!  ├─ 1. Validate  output format and filename (nothing staged yet)
//!  ├─ 2. Stage     upload written to uploads/{job}.pdf
//!  ├─ 3. Extract   pdfium text + table detection   [worker pool]
//!  ├─ 4. Serialize json / csv / txt → outputs/...   [worker pool]
//!  ├─ 5. Deliver   artifact streamed to the client
//!  └─ 6. Cleanup   staged input and output removed, on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_extractor::{JobCoordinator, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().workers(2).build()?;
//!     let coordinator = JobCoordinator::from_config(&config).await?;
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let artifact = coordinator.process(bytes, Some("csv"), None).await?;
//!     println!("{}", String::from_utf8_lossy(&artifact.read_to_vec().await?));
//!     artifact.release().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-extractor` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library:
//! ```toml
//! pdf-extractor = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod job;
pub mod notify;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod staging;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use coordinator::{Artifact, JobCoordinator, PoolHealth};
pub use error::{ErrorClass, ExtractError};
pub use gateway::{router, serve, AppState};
pub use job::{Job, JobId, JobState, NotifyTarget, Stage};
pub use notify::{JobOutcome, LogNotifier, NoopNotifier, Notifier, SharedNotifier};
pub use output::{OutputFormat, PageRecord, StructuredResult, Table, TableRow};
pub use pipeline::extract::{ExtractionEngine, PdfiumEngine};
pub use pipeline::serialize::serialize;
pub use pipeline::tables::{TableDetector, TextCell};
pub use pool::{Dispatch, WorkerPool};
pub use staging::{StagedFiles, StagingStore};
