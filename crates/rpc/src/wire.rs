//! TCP wire format for RPC calls.
//!
//! # Wire format
//!
//! ```text
//! FRAME:
//!   [1 byte: kind]
//!   [4 bytes BE: payload_len]
//!   [payload_len bytes: payload]
//!
//! KINDS:
//!   0x01 CALL    client -> server  JSON {"method": ..., "filename"?: ...}
//!   0x02 HEADER  client -> server  UTF-8 filename (first upload chunk)
//!   0x03 DATA    both directions   raw file content
//!   0x04 END     client -> server  empty, closes the upload chunk stream
//!   0x05 REPLY   server -> client  JSON reply payload
//!   0x06 STATUS  server -> client  JSON {"code": ..., "message": ...}, last frame of a call
//! ```

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use filegate_protocol::{FileChunk, MAX_FRAME_SIZE, Status};

use crate::error::RpcError;

/// Frame discriminator byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Call = 0x01,
    Header = 0x02,
    Data = 0x03,
    End = 0x04,
    Reply = 0x05,
    Status = 0x06,
}

impl TryFrom<u8> for FrameKind {
    type Error = RpcError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(Self::Call),
            0x02 => Ok(Self::Header),
            0x03 => Ok(Self::Data),
            0x04 => Ok(Self::End),
            0x05 => Ok(Self::Reply),
            0x06 => Ok(Self::Status),
            other => Err(RpcError::UnknownFrame(other)),
        }
    }
}

/// A frame read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl Frame {
    /// Deserializes a JSON payload.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Converts a `Header` or `Data` frame into a [`FileChunk`].
    pub fn into_chunk(self) -> Result<FileChunk, RpcError> {
        match self.kind {
            FrameKind::Header => {
                let filename = String::from_utf8(self.payload.to_vec()).map_err(|e| {
                    RpcError::Protocol(format!("invalid UTF-8 filename: {e}"))
                })?;
                Ok(FileChunk::Header { filename })
            }
            FrameKind::Data => Ok(FileChunk::Data(self.payload)),
            other => Err(RpcError::Protocol(format!(
                "expected chunk frame, got {other:?}"
            ))),
        }
    }
}

/// Writes a single frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    kind: FrameKind,
    payload: &[u8],
) -> Result<(), RpcError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge(payload.len()));
    }

    writer.write_u8(kind as u8).await?;
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    Ok(())
}

/// Writes a frame with a JSON payload.
pub async fn write_json<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    kind: FrameKind,
    value: &T,
) -> Result<(), RpcError> {
    let payload = serde_json::to_vec(value)?;
    write_frame(writer, kind, &payload).await
}

/// Writes a chunk as a `Header` or `Data` frame.
pub async fn write_chunk<W: AsyncWrite + Unpin>(
    writer: &mut W,
    chunk: &FileChunk,
) -> Result<(), RpcError> {
    match chunk {
        FileChunk::Header { filename } => {
            write_frame(writer, FrameKind::Header, filename.as_bytes()).await
        }
        FileChunk::Data(content) => write_frame(writer, FrameKind::Data, content).await,
    }
}

/// Writes the trailing status of a call.
pub async fn write_status<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: &Status,
) -> Result<(), RpcError> {
    write_json(writer, FrameKind::Status, status).await
}

/// Reads the next frame.
///
/// Returns `None` if the peer closed the connection on a frame boundary.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>, RpcError> {
    let kind = match reader.read_u8().await {
        Ok(byte) => FrameKind::try_from(byte)?,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame {
        kind,
        payload: Bytes::from(payload),
    }))
}
