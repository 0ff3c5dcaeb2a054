//! Splits an upload body into transfer chunks.

use std::io;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};

use filegate_protocol::FileChunk;

use crate::transfer::ChunkStream;

/// Produces a header chunk for `filename` followed by the body content in
/// pieces of `chunk_size` bytes.
///
/// The body is read lazily, one piece per poll. Only the last piece may be
/// shorter, and no empty piece is ever produced. A read error ends the
/// stream with that error.
pub fn upload_chunks<'a, R>(filename: String, body: R, chunk_size: usize) -> ChunkStream<'a>
where
    R: AsyncRead + Unpin + Send + 'a,
{
    let chunk_size = chunk_size.max(1);
    let header =
        futures_util::stream::once(async move { Ok::<_, io::Error>(FileChunk::Header { filename }) });
    let content = futures_util::stream::try_unfold(body, move |mut body| async move {
        let piece = read_piece(&mut body, chunk_size).await?;
        Ok(piece.map(|bytes| (FileChunk::Data(bytes), body)))
    });
    header.chain(content).boxed()
}

/// Reads until `chunk_size` bytes are buffered or the body ends.
async fn read_piece<R>(body: &mut R, chunk_size: usize) -> io::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(chunk_size);
    while buf.len() < chunk_size {
        let mut limited = (&mut *body).take((chunk_size - buf.len()) as u64);
        if limited.read_buf(&mut buf).await? == 0 {
            break;
        }
    }
    if buf.is_empty() {
        return Ok(None);
    }
    Ok(Some(buf.freeze()))
}
