//! Document extraction: raw PDF bytes → page-ordered [`StructuredResult`].
//!
//! The pipeline only depends on the [`ExtractionEngine`] trait. Engines are
//! blocking and CPU-bound; the coordinator always calls them from inside
//! the worker pool, never from an async task directly.
//!
//! [`PdfiumEngine`] is the shipped implementation. It binds the pdfium
//! library on every call and holds no state between jobs.

use crate::error::ExtractError;
use crate::output::{PageRecord, StructuredResult};
use crate::pipeline::tables::{TableDetector, TextCell};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns raw document bytes into per-page records.
pub trait ExtractionEngine: Send + Sync {
    /// Parse `document`. Pages come back in document order, numbered from 1.
    ///
    /// # Errors
    /// [`ExtractError::CorruptDocument`] or [`ExtractError::PasswordRequired`]
    /// when the document cannot be read.
    fn extract(&self, document: &[u8]) -> Result<StructuredResult, ExtractError>;
}

/// pdfium-backed engine: page text plus geometry-detected tables.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
    password: Option<String>,
    tables: TableDetector,
}

impl PdfiumEngine {
    /// Use the library at `PDFIUM_LIB_PATH` if set, otherwise the system one.
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
            ..Self::default()
        }
    }

    /// `path` is the directory holding libpdfium, or the library file itself
    /// (its directory is searched for the platform library name).
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_table_detector(mut self, detector: TableDetector) -> Self {
        self.tables = detector;
        self
    }

    fn bind(&self) -> Result<Pdfium, ExtractError> {
        let bindings = match self.library_path.as_deref() {
            Some(path) => {
                let dir = library_dir(path);
                let dir = dir.to_string_lossy();
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&*dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?;
        Ok(Pdfium::new(bindings))
    }
}

/// Directory to look for the platform library in.
fn library_dir(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl ExtractionEngine for PdfiumEngine {
    fn extract(&self, document: &[u8]) -> Result<StructuredResult, ExtractError> {
        let pdfium = self.bind()?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, self.password.as_deref())
            .map_err(|e| {
                let detail = format!("{e:?}");
                if detail.contains("Password") || detail.contains("password") {
                    ExtractError::PasswordRequired
                } else {
                    ExtractError::CorruptDocument { detail }
                }
            })?;

        let pages = doc.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut records = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let page_num = idx + 1;
            let text = page.text().map_err(|e| ExtractError::CorruptDocument {
                detail: format!("page {page_num}: {e:?}"),
            })?;

            let page_height = page.height().value;
            let cells: Vec<TextCell> = text
                .segments()
                .iter()
                .filter_map(|segment| {
                    let content = segment.text();
                    let content = content.trim();
                    if content.is_empty() {
                        return None;
                    }
                    let bounds = segment.bounds();
                    // PDF space has a bottom-left origin.
                    Some(TextCell::new(
                        content,
                        bounds.left().value,
                        page_height - bounds.top().value,
                        bounds.right().value - bounds.left().value,
                        bounds.top().value - bounds.bottom().value,
                    ))
                })
                .collect();

            let tables = self.tables.detect(&cells);
            let body = text.all().trim().to_string();
            debug!(
                "Page {}: {} chars, {} cells, {} tables",
                page_num,
                body.len(),
                cells.len(),
                tables.len()
            );

            records.push(PageRecord {
                page: page_num,
                text: body,
                tables,
            });
        }

        Ok(records)
    }
}
