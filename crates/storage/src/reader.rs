use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use tokio::io::AsyncReadExt;

use crate::StorageError;

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a stored file front to back in fixed-size chunks.
///
/// Every chunk is exactly `chunk_size` bytes except the last, which holds
/// the remainder. The reader is single-pass: open a new one to start over.
pub struct ChunkReader {
    file: tokio::fs::File,
    filename: String,
    chunk_size: usize,
    offset: u64,
}

impl ChunkReader {
    pub(crate) fn new(file: tokio::fs::File, filename: String, chunk_size: usize) -> Self {
        Self {
            file,
            filename,
            chunk_size,
            offset: 0,
        }
    }

    /// Reads the next chunk. Returns `None` at EOF.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StorageError> {
        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        self.offset += filled as u64;
        Ok(Some(buf.freeze()))
    }

    /// Converts the reader into a stream of chunks.
    ///
    /// The stream ends after EOF or after the first error; chunks yielded
    /// before an error are still valid.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, StorageError>> + Send + 'static {
        futures_util::stream::try_unfold(self, |mut reader| async move {
            match reader.next_chunk().await {
                Ok(Some(chunk)) => Ok(Some((chunk, reader))),
                Ok(None) => {
                    tracing::debug!(
                        filename = %reader.filename,
                        bytes = reader.offset,
                        "finished reading file"
                    );
                    Ok(None)
                }
                Err(e) => {
                    tracing::warn!(
                        filename = %reader.filename,
                        offset = reader.offset,
                        "read failed mid-stream: {e}"
                    );
                    Err(e)
                }
            }
        })
    }

    /// Bytes read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Name of the file being read.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}
