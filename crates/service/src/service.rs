use std::pin::pin;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};

use filegate_protocol::{FileChunk, ListFilesResponse, Status, UploadResponse};
use filegate_storage::{AppendHandle, LocalStorage, StorageError};

use crate::ServiceError;

/// Content chunks of a download, ending early with a status on failure.
pub type DownloadStream = BoxStream<'static, Result<FileChunk, Status>>;

/// Upload progress through one chunk stream.
enum UploadState {
    AwaitingFilename,
    Streaming(AppendHandle),
}

/// The transfer service. Cheap to share behind an `Arc`; holds no
/// per-transfer state.
pub struct FileService {
    storage: LocalStorage,
}

impl FileService {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Lists the stored filenames.
    ///
    /// A storage failure yields an empty list paired with an internal
    /// status, so callers must check the status before trusting an empty
    /// result.
    pub async fn list(&self) -> (ListFilesResponse, Status) {
        match self.storage.list().await {
            Ok(filenames) => {
                tracing::debug!(count = filenames.len(), "listed storage root");
                (ListFilesResponse { filenames }, Status::ok())
            }
            Err(e) => {
                tracing::error!("listing storage root failed: {e}");
                (ListFilesResponse::default(), Status::internal(e.to_string()))
            }
        }
    }

    /// Consumes an upload chunk stream, appending content as each chunk
    /// arrives.
    ///
    /// The first chunk must be a [`FileChunk::Header`]. Any failure aborts
    /// immediately; bytes already appended stay on disk.
    pub async fn upload<S, E>(&self, chunks: S) -> (UploadResponse, Status)
    where
        S: Stream<Item = Result<FileChunk, E>>,
        E: std::fmt::Display,
    {
        match self.receive(chunks).await {
            Ok(Some(handle)) => {
                tracing::info!(
                    filename = %handle.filename(),
                    bytes = handle.written(),
                    "upload complete"
                );
                (UploadResponse::succeeded(), Status::ok())
            }
            Ok(None) => {
                tracing::debug!("upload stream was empty");
                (UploadResponse::succeeded(), Status::ok())
            }
            Err(e) => {
                tracing::warn!("upload failed: {e}");
                (UploadResponse::failed(), Status::internal(e.to_string()))
            }
        }
    }

    async fn receive<S, E>(&self, chunks: S) -> Result<Option<AppendHandle>, ServiceError>
    where
        S: Stream<Item = Result<FileChunk, E>>,
        E: std::fmt::Display,
    {
        let mut chunks = pin!(chunks);
        let mut state = UploadState::AwaitingFilename;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| ServiceError::Interrupted(e.to_string()))?;
            state = match (state, chunk) {
                (UploadState::AwaitingFilename, FileChunk::Header { filename }) => {
                    if filename.is_empty() {
                        return Err(ServiceError::Protocol("filename is missing".into()));
                    }
                    tracing::debug!(%filename, "upload started");
                    UploadState::Streaming(self.storage.open_append(&filename).await?)
                }
                (UploadState::AwaitingFilename, FileChunk::Data(_)) => {
                    return Err(ServiceError::Protocol("filename is missing".into()));
                }
                (UploadState::Streaming(_), FileChunk::Header { .. }) => {
                    return Err(ServiceError::Protocol("duplicate filename header".into()));
                }
                (UploadState::Streaming(mut handle), FileChunk::Data(bytes)) => {
                    handle.write(&bytes).await?;
                    UploadState::Streaming(handle)
                }
            };
        }

        Ok(match state {
            UploadState::Streaming(handle) => Some(handle),
            UploadState::AwaitingFilename => None,
        })
    }

    /// Opens `filename` for a chunked download.
    ///
    /// Fails up front with a not-found status when the file is absent.
    /// A read error later ends the stream with an internal status after
    /// the chunks already produced.
    pub async fn download(&self, filename: &str) -> Result<DownloadStream, Status> {
        match self.storage.read_sequential(filename).await {
            Ok(reader) => {
                tracing::debug!(%filename, "download started");
                Ok(content_chunks(reader.into_stream()))
            }
            Err(e @ StorageError::NotFound(_)) => {
                tracing::debug!(%filename, "download of missing file");
                Err(Status::not_found(e.to_string()))
            }
            Err(e @ StorageError::InvalidName(_)) => Err(Status::invalid_argument(e.to_string())),
            Err(e) => {
                tracing::error!(%filename, "opening file for download failed: {e}");
                Err(Status::internal(e.to_string()))
            }
        }
    }
}

/// Wraps raw content as [`FileChunk::Data`], stopping after the first error.
fn content_chunks<S>(chunks: S) -> DownloadStream
where
    S: Stream<Item = Result<Bytes, StorageError>> + Send + 'static,
{
    chunks
        .scan(false, |failed, item| {
            let next = if *failed {
                None
            } else {
                *failed = item.is_err();
                Some(
                    item.map(FileChunk::Data)
                        .map_err(|e| Status::internal(e.to_string())),
                )
            };
            futures_util::future::ready(next)
        })
        .boxed()
}
