//! Route handlers.

use std::io;

use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderValue;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use futures_util::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::upload::upload_chunks;
use crate::{AppState, FILE_FIELD};

/// Body of `GET /files/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListBody {
    pub filenames: Vec<String>,
}

/// Body of a successful `POST /upload/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

pub(crate) async fn list_files(State(state): State<AppState>) -> Result<Json<FileListBody>, ApiError> {
    let filenames = state
        .transfer
        .list_files()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    debug!(count = filenames.len(), "listed files");
    Ok(Json(FileListBody { filenames }))
}

/// Forwards the `file` field of a multipart upload chunk by chunk.
pub(crate) async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageBody>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => return Err(ApiError::BadRequest("missing filename".into())),
        };
        debug!(%filename, "upload started");

        let body = StreamReader::new(Box::pin(field.map_err(io::Error::other)));
        let chunks = upload_chunks(filename, body, state.chunk_size);
        let resp = state
            .transfer
            .upload_file(chunks)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        return Ok(Json(MessageBody {
            message: resp.message,
        }));
    }
    Err(ApiError::BadRequest("missing file field".into()))
}

/// Streams a stored file back to the client.
///
/// The first chunk is pulled before the response is committed so that a
/// missing file becomes a 404. Failures after that abort the body.
pub(crate) async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename={filename}"))
        .map_err(|_| ApiError::BadRequest(format!("invalid filename: {filename:?}")))?;

    let mut content = state.transfer.download_file(filename.clone()).await?;
    let first = match content.next().await {
        Some(Err(e)) => return Err(e.into()),
        first => first,
    };

    let body = futures_util::stream::iter(first)
        .chain(content)
        .inspect_err(move |e| warn!(%filename, "download aborted: {e}"));
    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
        (CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, Body::from_stream(body)).into_response())
}
