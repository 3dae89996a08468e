//! Error types for the pdf-extractor service.
//!
//! Every failure in the pipeline is an [`ExtractError`]. Callers rarely care
//! about the exact variant; they care about which *class* of failure
//! happened, because that decides the HTTP status and whether resubmitting
//! could help. [`ExtractError::class`] reduces the variant to an
//! [`ErrorClass`]:
//!
//! | Class           | Meaning                                   | Status |
//! |-----------------|-------------------------------------------|--------|
//! | `Input`         | bad document type, unsupported format     | 400    |
//! | `Extraction`    | the document could not be parsed          | 422    |
//! | `Serialization` | the output encoding failed                | 500    |
//! | `Resource`      | pool unavailable, disk failure, panics    | 503    |

use crate::job::Stage;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf-extractor library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded file does not look like a PDF.
    #[error("Only PDF files are supported (got '{filename}')")]
    InvalidDocumentType { filename: String },

    /// The requested output format is not one of json, csv, txt.
    #[error("Unsupported output format '{0}'. Expected one of: json, csv, txt")]
    UnsupportedFormat(String),

    /// The request did not carry a document at all.
    #[error("No document was uploaded (expected a multipart field named 'file')")]
    MissingDocument,

    /// The multipart body could not be read.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// The upload exceeded the configured size limit.
    #[error("Upload exceeds the {limit}-byte limit")]
    UploadTooLarge { limit: usize },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The document header/trailer/xref is corrupt or unsupported.
    #[error("Document could not be parsed: {detail}")]
    CorruptDocument { detail: String },

    /// The document is encrypted and no (or a wrong) password was given.
    #[error("Document is encrypted and requires a password")]
    PasswordRequired,

    // ── Serialization errors ──────────────────────────────────────────────
    /// Writing the output artifact failed.
    #[error("Failed to write {format} output to '{path}': {detail}")]
    Serialization {
        format: String,
        path: PathBuf,
        detail: String,
    },

    // ── Resource errors ───────────────────────────────────────────────────
    /// The worker pool has been shut down.
    #[error("Worker pool is unavailable (service is shutting down)")]
    PoolUnavailable,

    /// A unit of work panicked on its worker thread.
    #[error("{stage} worker panicked: {detail}")]
    WorkerPanicked { stage: Stage, detail: String },

    /// Reading or writing a staged file failed.
    #[error("Staging I/O failed for '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH (or --pdfium-lib) to the directory containing libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Input,
    Extraction,
    Serialization,
    Resource,
}

impl ErrorClass {
    /// HTTP status code for this class.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorClass::Input => 400,
            ErrorClass::Extraction => 422,
            ErrorClass::Serialization => 500,
            ErrorClass::Resource => 503,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Input => "input",
            ErrorClass::Extraction => "extraction",
            ErrorClass::Serialization => "serialization",
            ErrorClass::Resource => "resource",
        };
        f.write_str(s)
    }
}

impl ExtractError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            ExtractError::InvalidDocumentType { .. }
            | ExtractError::UnsupportedFormat(_)
            | ExtractError::MissingDocument
            | ExtractError::MalformedUpload(_)
            | ExtractError::UploadTooLarge { .. }
            | ExtractError::InvalidConfig(_) => ErrorClass::Input,
            ExtractError::CorruptDocument { .. } | ExtractError::PasswordRequired => {
                ErrorClass::Extraction
            }
            ExtractError::Serialization { .. } => ErrorClass::Serialization,
            ExtractError::PoolUnavailable
            | ExtractError::WorkerPanicked { .. }
            | ExtractError::Staging { .. }
            | ExtractError::PdfiumBindingFailed(_)
            | ExtractError::Internal(_) => ErrorClass::Resource,
        }
    }

    /// HTTP status for this error: its class status, except 413 for
    /// oversized uploads.
    pub fn status_code(&self) -> u16 {
        match self {
            ExtractError::UploadTooLarge { .. } => 413,
            other => other.class().status_code(),
        }
    }

    pub(crate) fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Staging {
            path: path.into(),
            source,
        }
    }
}
