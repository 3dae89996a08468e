//! HTTP surface.
//!
//! | Route           | Purpose                                              |
//! |-----------------|------------------------------------------------------|
//! | `POST /extract` | multipart upload (`file`) → streamed artifact        |
//! | `GET /status`   | liveness plus worker pool occupancy                  |
//!
//! `POST /extract` takes two query parameters: `output_format`
//! (`json` | `csv` | `txt`, default `json`) and an optional `callback_url`.
//! The format and the filename are checked before anything touches disk.
//!
//! Errors come back as `{"error": "...", "class": "..."}` with the status
//! of their [`ErrorClass`](crate::error::ErrorClass).

use crate::coordinator::{Artifact, JobCoordinator};
use crate::error::{ErrorClass, ExtractError};
use crate::job::NotifyTarget;
use crate::output::OutputFormat;
use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Size of each chunk streamed back to the client.
const CHUNK_SIZE: usize = 64 * 1024;

/// Response header carrying the job id.
pub const JOB_ID_HEADER: &str = "x-job-id";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: JobCoordinator,
    pub version: &'static str,
    /// Set by [`router`] from its `max_upload_bytes`.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(coordinator: JobCoordinator) -> Self {
        Self {
            coordinator,
            version: env!("CARGO_PKG_VERSION"),
            max_upload_bytes: usize::MAX,
        }
    }
}

/// Build the service router.
pub fn router(mut state: AppState, max_upload_bytes: usize) -> Router {
    state.max_upload_bytes = max_upload_bytes;
    Router::new()
        .route("/extract", post(extract))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `listener` until `shutdown` resolves, then drain the pool.
pub async fn serve<S>(
    listener: TcpListener,
    state: AppState,
    max_upload_bytes: usize,
    shutdown: S,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let pool = std::sync::Arc::clone(state.coordinator.pool());
    info!("pdf-extractor listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state, max_upload_bytes))
        .with_graceful_shutdown(shutdown)
        .await?;

    pool.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ExtractParams {
    pub output_format: Option<String>,
    pub callback_url: Option<String>,
}

async fn extract(
    State(state): State<AppState>,
    Query(params): Query<ExtractParams>,
    mut multipart: Multipart,
) -> Result<Response, ExtractError> {
    let format = OutputFormat::from_param(params.output_format.as_deref())?;
    let notify = NotifyTarget::parse(params.callback_url);
    let document = read_document(&mut multipart, state.max_upload_bytes).await?;

    // The job owns its task; if this request is dropped the job still
    // finishes and its unclaimed artifact is cleaned up.
    let artifact = state
        .coordinator
        .spawn(document, format, notify)
        .await
        .map_err(|e| ExtractError::Internal(format!("job task failed: {e}")))??;

    deliver(artifact).await
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    accepting: bool,
    workers: usize,
    in_flight: usize,
    version: &'static str,
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let health = state.coordinator.health();
    Json(StatusBody {
        status: if health.accepting { "healthy" } else { "draining" },
        accepting: health.accepting,
        workers: health.workers,
        in_flight: health.in_flight,
        version: state.version,
    })
}

/// Pull the `file` field out of the upload, checking its name first.
async fn read_document(multipart: &mut Multipart, limit: usize) -> Result<Bytes, ExtractError> {
    let upload_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ExtractError::UploadTooLarge { limit }
        } else {
            ExtractError::MalformedUpload(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some("file") {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        let filename = field.file_name().unwrap_or("file.pdf").to_string();
        if !is_pdf_filename(&filename) {
            return Err(ExtractError::InvalidDocumentType { filename });
        }
        let data = field.bytes().await.map_err(upload_error)?;
        debug!("Read {} bytes from '{}'", data.len(), filename);
        return Ok(data);
    }
    Err(ExtractError::MissingDocument)
}

/// `true` when `name` ends in `.pdf`, ignoring case.
pub fn is_pdf_filename(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Stream the artifact back, releasing its files once the last chunk is
/// handed off or the client goes away.
async fn deliver(artifact: Artifact) -> Result<Response, ExtractError> {
    let mut file = artifact.open().await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name());
    let job_id = artifact.job_id().to_string();
    let content_type = artifact.content_type();

    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(4);
    tokio::spawn(async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        debug!(job = %artifact.job_id(), "client went away mid-stream");
                        break;
                    }
                }
                Err(e) => {
                    warn!(job = %artifact.job_id(), "Reading artifact failed: {}", e);
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        drop(file);
        artifact.release().await;
    });

    let mut response = Body::from_stream(ReceiverStream::new(rx)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    if let Ok(v) = HeaderValue::from_str(&job_id) {
        headers.insert(JOB_ID_HEADER, v);
    }
    Ok(response)
}

// ── Error mapping ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    class: ErrorClass,
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        let class = self.class();
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
                class,
            }),
        )
            .into_response()
    }
}
