//! HTTP gateway for the transfer service.
//!
//! Exposes three endpoints and forwards each request as a single RPC
//! call through a [`FileTransfer`] implementation:
//!
//! - `GET /files/` lists stored filenames
//! - `POST /upload/` streams a multipart `file` field as 1 KiB chunks
//! - `GET /download/{filename}` streams the file back as `application/octet-stream`
//!
//! The gateway never touches disk and never holds more than one chunk.

mod error;
mod routes;
mod transfer;
mod upload;

pub use error::{ApiError, ErrorBody};
pub use routes::{FileListBody, MessageBody};
pub use transfer::{ChunkStream, FileTransfer, TransferFuture};
pub use upload::upload_chunks;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use filegate_protocol::DEFAULT_CHUNK_SIZE;

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Default cap on an upload request body (1 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) transfer: Arc<dyn FileTransfer>,
    pub(crate) chunk_size: usize,
    pub(crate) max_upload_bytes: usize,
}

impl AppState {
    pub fn new(transfer: Arc<dyn FileTransfer>) -> Self {
        Self {
            transfer,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Sets the upload chunk size (0 keeps the default).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Builds the gateway router.
pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/files/", get(routes::list_files))
        .route("/upload/", post(routes::upload_file))
        .route("/download/{filename}", get(routes::download_file))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `router` on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!("gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}
