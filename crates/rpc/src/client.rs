//! RPC client (gateway side).
//!
//! Connections are opened on demand and returned to a small idle set once
//! a call has read its final status, so sequential calls share one TCP
//! connection. Upload chunks are forwarded as they are produced, and
//! download content is pulled from the socket only as fast as the consumer
//! polls the returned stream. A download dropped before its status closes
//! its connection.

use std::fmt;
use std::io;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use filegate_protocol::{Call, FileChunk, ListFilesResponse, Status, UploadResponse};

use crate::error::RpcError;
use crate::wire::{FrameKind, read_frame, write_chunk, write_frame, write_json};
use crate::{CONNECT_TIMEOUT, TCP_BUFFER_SIZE};

/// Raw content of a download, ending with an error if the call fails.
pub type ContentStream = BoxStream<'static, Result<Bytes, RpcError>>;

/// Idle connections kept per client (clones share them).
pub const MAX_IDLE_CONNECTIONS: usize = 8;

/// Client for the transfer service.
///
/// Clones share the same idle connections. Call [`close`](Self::close) at
/// shutdown to drop them.
#[derive(Debug, Clone)]
pub struct RpcClient {
    addr: String,
    connect_timeout: Duration,
    idle: Arc<IdleConnections>,
}

impl RpcClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: CONNECT_TIMEOUT,
            idle: Arc::default(),
        }
    }

    /// Bounds the TCP connect attempt. Calls themselves are never timed out.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Address of the transfer service.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of connections waiting for reuse.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    /// Closes every idle connection. Calls in flight are unaffected.
    pub fn close(&self) {
        let closed = std::mem::take(&mut *self.idle.lock()).len();
        debug!(addr = %self.addr, closed, "rpc client closed");
    }

    async fn connect(&self) -> Result<Connection, RpcError> {
        if let Some(conn) = self.idle.take() {
            return Ok(conn);
        }

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(RpcError::Timeout),
        };
        stream.set_nodelay(true)?;
        debug!(addr = %self.addr, "rpc connection opened");

        let (reader, writer) = stream.into_split();
        Ok(Connection {
            reader: BufReader::with_capacity(TCP_BUFFER_SIZE, reader),
            writer: BufWriter::with_capacity(TCP_BUFFER_SIZE, writer),
        })
    }

    /// Returns `conn` to the idle set if `result` ended at a call boundary.
    fn finish<T>(&self, conn: Connection, result: &Result<T, RpcError>) {
        if matches!(result, Ok(_) | Err(RpcError::Status { .. })) {
            self.idle.put(conn);
        }
    }

    /// Lists the filenames held by the service.
    pub async fn list_files(&self) -> Result<Vec<String>, RpcError> {
        let mut conn = self.connect().await?;
        conn.call(&Call::list_files()).await?;
        let result = conn.read_reply::<ListFilesResponse>().await;
        self.finish(conn, &result);
        Ok(result?.filenames)
    }

    /// Streams an upload to the service.
    ///
    /// Each chunk is sent as soon as `chunks` yields it. An error from
    /// `chunks` aborts the call; the service keeps whatever it already
    /// appended.
    pub async fn upload_file<S, E>(&self, chunks: S) -> Result<UploadResponse, RpcError>
    where
        S: Stream<Item = Result<FileChunk, E>>,
        E: Into<RpcError>,
    {
        let mut conn = self.connect().await?;
        conn.call(&Call::upload_file()).await?;

        let mut chunks = pin!(chunks);
        let mut count: usize = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(Into::into)?;
            write_chunk(&mut conn.writer, &chunk).await?;
            conn.writer.flush().await?;
            count += 1;
        }
        write_frame(&mut conn.writer, FrameKind::End, &[]).await?;
        conn.writer.flush().await?;

        let result = conn.read_reply::<UploadResponse>().await;
        self.finish(conn, &result);
        let resp = result?;
        info!(chunks = count, message = %resp.message, "upload finished");
        Ok(resp)
    }

    /// Requests a download.
    ///
    /// Nothing is read until the returned stream is polled. A missing file
    /// surfaces as the first item, an [`RpcError::Status`] with
    /// [`StatusCode::NotFound`](filegate_protocol::StatusCode::NotFound).
    pub async fn download_file(&self, filename: &str) -> Result<ContentStream, RpcError> {
        let mut conn = self.connect().await?;
        conn.call(&Call::download_file(filename)).await?;

        let idle = Arc::clone(&self.idle);
        let stream = futures_util::stream::try_unfold(conn, move |mut conn| {
            let idle = Arc::clone(&idle);
            async move {
                let Some(frame) = read_frame(&mut conn.reader).await? else {
                    return Err(RpcError::Protocol("connection closed before status".into()));
                };
                match frame.kind {
                    FrameKind::Data => Ok(Some((frame.payload, conn))),
                    FrameKind::Status => {
                        let status: Status = frame.parse_json()?;
                        idle.put(conn);
                        if status.is_ok() {
                            Ok(None)
                        } else {
                            Err(status.into())
                        }
                    }
                    other => Err(RpcError::Protocol(format!(
                        "unexpected {other:?} frame during download"
                    ))),
                }
            }
        });
        Ok(stream.boxed())
    }
}

// ---------------------------------------------------------------------------
// IdleConnections
// ---------------------------------------------------------------------------

#[derive(Default)]
struct IdleConnections {
    conns: Mutex<Vec<Connection>>,
}

impl IdleConnections {
    fn lock(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.conns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pops the most recent connection the peer has not closed.
    fn take(&self) -> Option<Connection> {
        let mut conns = self.lock();
        while let Some(conn) = conns.pop() {
            if conn.is_reusable() {
                return Some(conn);
            }
            debug!("discarding stale rpc connection");
        }
        None
    }

    fn put(&self, conn: Connection) {
        let mut conns = self.lock();
        if conns.len() < MAX_IDLE_CONNECTIONS {
            conns.push(conn);
        }
    }
}

impl fmt::Debug for IdleConnections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleConnections")
            .field("len", &self.lock().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Connection {
    /// An idle connection is reusable while nothing is buffered and the
    /// socket has neither pending data nor EOF.
    fn is_reusable(&self) -> bool {
        if !self.reader.buffer().is_empty() || !self.writer.buffer().is_empty() {
            return false;
        }
        let mut probe = [0u8; 1];
        matches!(
            self.reader.get_ref().try_read(&mut probe),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock
        )
    }

    async fn call(&mut self, call: &Call) -> Result<(), RpcError> {
        write_json(&mut self.writer, FrameKind::Call, call).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads a `Reply` frame followed by the trailing `Status`.
    ///
    /// A non-ok status wins over any reply received before it.
    async fn read_reply<T: DeserializeOwned>(&mut self) -> Result<T, RpcError> {
        let mut reply: Option<T> = None;
        loop {
            let Some(frame) = read_frame(&mut self.reader).await? else {
                return Err(RpcError::Protocol("connection closed before status".into()));
            };
            match frame.kind {
                FrameKind::Reply => reply = Some(frame.parse_json()?),
                FrameKind::Status => {
                    let status: Status = frame.parse_json()?;
                    if !status.is_ok() {
                        return Err(status.into());
                    }
                    return reply
                        .ok_or_else(|| RpcError::Protocol("status received without reply".into()));
                }
                other => {
                    return Err(RpcError::Protocol(format!(
                        "unexpected {other:?} frame awaiting reply"
                    )));
                }
            }
        }
    }
}
