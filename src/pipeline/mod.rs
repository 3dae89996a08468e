//! CPU-bound pipeline stages.
//!
//! Each submodule implements exactly one transformation step. All of them
//! are synchronous; [`crate::coordinator`] runs them on the worker pool.
//!
//! ## Data Flow
//!
//! ```text
//! PDF bytes ──▶ extract ──▶ StructuredResult ──▶ serialize ──▶ artifact file
//!               (pdfium)       (tables)           (json/csv/txt)
//! ```
//!
//! 1. [`extract`]: the [`extract::ExtractionEngine`] capability and its
//!    pdfium implementation
//! 2. [`tables`]: geometry heuristic turning positioned text into tables
//! 3. [`serialize`]: encode the page records into the requested format

pub mod extract;
pub mod serialize;
pub mod tables;
