//! Service configuration.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The CLI maps flags and environment
//! variables onto the builder; library users set only what they need and
//! rely on the defaults for the rest.

use crate::error::ExtractError;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for the extraction service.
///
/// # Example
/// ```rust
/// use pdf_extractor::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .workers(4)
///     .max_upload_bytes(16 * 1024 * 1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.workers, 4);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Address the HTTP gateway listens on. Default: `0.0.0.0:9000`.
    pub bind_addr: SocketAddr,

    /// Root of the scratch space; `uploads/` and `outputs/` live below it.
    /// Default: `$TMPDIR/pdf-extractor`.
    pub staging_dir: PathBuf,

    /// Worker pool size. Default: number of logical CPUs.
    ///
    /// This is the service's only admission control: at most this many
    /// extraction or serialization calls run at once.
    pub workers: usize,

    /// Largest accepted upload in bytes. Default: 64 MiB.
    pub max_upload_bytes: usize,

    /// Directory (or file) of the pdfium shared library. If None, uses
    /// `PDFIUM_LIB_PATH` or the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// User password applied when opening encrypted PDFs.
    pub password: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            staging_dir: std::env::temp_dir().join("pdf-extractor"),
            workers: num_cpus::get().max(1),
            max_upload_bytes: 64 * 1024 * 1024,
            pdfium_lib_path: None,
            password: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("staging_dir", &self.staging_dir)
            .field("workers", &self.workers)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = dir.into();
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ExtractError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(ExtractError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(ExtractError::InvalidConfig(
                "Maximum upload size must be > 0".into(),
            ));
        }
        if c.staging_dir.as_os_str().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Staging directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
