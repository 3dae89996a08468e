//! On-disk staging of job inputs and outputs.
//!
//! Every job gets two scratch paths derived from its [`JobId`]:
//!
//! ```text
//! {root}/uploads/{job_id}.pdf       staged input
//! {root}/outputs/{job_id}.{ext}     serialized artifact
//! ```
//!
//! Job ids are random UUIDs, so two jobs never share a path and no locking
//! is needed. Removal tolerates missing files: cleanup may run after a
//! partial failure, or twice, and must never fail either way.
//!
//! [`StagedFiles`] is the scoped-acquisition side of this module. Paths are
//! registered with the guard *before* anything is written to them, and the
//! guard removes whatever it still holds when it is released or dropped. A
//! panic, an early `?` return, or a cancelled future all end in the same
//! place.

use crate::error::ExtractError;
use crate::job::JobId;
use crate::output::OutputFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const INPUT_DIR: &str = "uploads";
const OUTPUT_DIR: &str = "outputs";

/// Isolated input/output scratch directories.
#[derive(Debug, Clone)]
pub struct StagingStore {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl StagingStore {
    /// Create (if needed) the staging directories under `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let root = root.as_ref();
        let input_dir = root.join(INPUT_DIR);
        let output_dir = root.join(OUTPUT_DIR);
        for dir in [&input_dir, &output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ExtractError::staging(dir, e))?;
        }
        debug!("Staging directories ready under {}", root.display());
        Ok(Self {
            input_dir,
            output_dir,
        })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the input for `job_id` is (or will be) staged at.
    pub fn input_path(&self, job_id: JobId) -> PathBuf {
        self.input_dir.join(format!("{job_id}.pdf"))
    }

    /// Write the uploaded document for `job_id` and return its path.
    pub async fn stage(&self, job_id: JobId, bytes: &[u8]) -> Result<PathBuf, ExtractError> {
        let path = self.input_path(job_id);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ExtractError::staging(&path, e))?;
        debug!(job = %job_id, bytes = bytes.len(), "staged input at {}", path.display());
        Ok(path)
    }

    /// Derive the artifact path for `job_id`. The file is not created.
    pub fn reserve_output_path(&self, job_id: JobId, format: OutputFormat) -> PathBuf {
        self.output_dir
            .join(format!("{job_id}.{}", format.extension()))
    }

    /// Delete each path if present. See [`remove_paths`].
    pub async fn remove<P: AsRef<Path>>(&self, paths: &[P]) -> usize {
        remove_paths(paths).await
    }

    /// Every staged file whose name derives from `job_id`, in either directory.
    pub async fn entries_for(&self, job_id: JobId) -> Result<Vec<PathBuf>, ExtractError> {
        let prefix = job_id.to_string();
        let mut found = Vec::new();
        for dir in [&self.input_dir, &self.output_dir] {
            let mut entries = tokio::fs::read_dir(dir)
                .await
                .map_err(|e| ExtractError::staging(dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ExtractError::staging(dir, e))?
            {
                if entry.file_name().to_string_lossy().starts_with(&prefix) {
                    found.push(entry.path());
                }
            }
        }
        Ok(found)
    }
}

/// Delete each path, ignoring ones that are already gone.
///
/// Any other failure is logged and skipped; cleanup never raises. Returns
/// the number of files actually removed.
pub async fn remove_paths<P: AsRef<Path>>(paths: &[P]) -> usize {
    let mut removed = 0;
    for path in paths {
        let path = path.as_ref();
        match tokio::fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete file {}: {}", path.display(), e),
        }
    }
    removed
}

fn remove_paths_blocking(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete file {}: {}", path.display(), e),
        }
    }
    removed
}

/// Staged paths owned by one job, removed exactly once.
///
/// Call [`StagedFiles::release`] on the normal path; `Drop` covers the rest.
#[derive(Debug)]
pub struct StagedFiles {
    job_id: JobId,
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            paths: Vec::with_capacity(2),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Take ownership of `path`. Register paths before writing to them.
    pub fn hold(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every held path.
    pub async fn release(mut self) {
        let paths = std::mem::take(&mut self.paths);
        let removed = remove_paths(&paths).await;
        debug!(job = %self.job_id, removed, "released staged files");
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        if self.paths.is_empty() {
            return;
        }
        let paths = std::mem::take(&mut self.paths);
        let removed = remove_paths_blocking(&paths);
        debug!(job = %self.job_id, removed, "staged files removed on drop");
    }
}
