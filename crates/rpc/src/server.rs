//! RPC server (transfer service side).
//!
//! Accepts connections until cancelled and serves calls on each one
//! sequentially, dispatching to a shared [`FileService`].

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use filegate_protocol::{Call, FileChunk, Method, Status};
use filegate_service::FileService;

use crate::TCP_BUFFER_SIZE;
use crate::error::RpcError;
use crate::wire::{FrameKind, read_frame, write_chunk, write_json, write_status};

/// The transfer service RPC server.
pub struct RpcServer {
    service: Arc<FileService>,
    cancel: CancellationToken,
}

impl RpcServer {
    pub fn new(service: FileService, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            service: Arc::new(service),
            cancel,
        })
    }

    /// Binds the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<TcpListener, RpcError> {
        Ok(TcpListener::bind(addr).await?)
    }

    /// Stops accepting connections and aborts in-flight calls.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serves connections from `listener` until cancellation.
    pub async fn run(self: &Arc<Self>, listener: TcpListener) -> Result<(), RpcError> {
        let local_addr = listener.local_addr()?;
        info!("rpc server listening on {local_addr}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("rpc server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                match server.handle_connection(stream, peer_addr).await {
                                    Ok(()) | Err(RpcError::Cancelled) => {}
                                    Err(e) => warn!(%peer_addr, "connection error: {e}"),
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Serves calls on one connection until the peer closes it.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), RpcError> {
        debug!(%peer_addr, "rpc connection accepted");
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RpcError::Cancelled),
                frame = read_frame(&mut reader) => frame?,
            };

            let Some(frame) = frame else {
                debug!(%peer_addr, "rpc connection closed");
                return Ok(());
            };

            let call = match frame.kind {
                FrameKind::Call => frame.parse_json::<Call>(),
                other => Err(RpcError::Protocol(format!(
                    "expected call frame, got {other:?}"
                ))),
            };
            let call = match call {
                Ok(call) => call,
                Err(e) => {
                    write_status(&mut writer, &Status::invalid_argument(e.to_string())).await?;
                    writer.flush().await?;
                    return Err(e);
                }
            };

            let span = tracing::info_span!(
                "call",
                id = %uuid::Uuid::new_v4(),
                method = ?call.method,
                %peer_addr
            );
            let keep_open = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RpcError::Cancelled),
                result = self.dispatch(call, &mut reader, &mut writer).instrument(span) => result?,
            };
            if !keep_open {
                return Ok(());
            }
        }
    }

    /// Runs one call. Returns `false` when the connection can no longer
    /// carry further calls.
    async fn dispatch<R, W>(
        &self,
        call: Call,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<bool, RpcError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        match call.method {
            Method::ListFiles => {
                let (resp, status) = self.service.list().await;
                write_json(writer, FrameKind::Reply, &resp).await?;
                write_status(writer, &status).await?;
                writer.flush().await?;
                Ok(true)
            }
            Method::UploadFile => self.upload(reader, writer).await,
            Method::DownloadFile => {
                self.download(call.filename, writer).await?;
                Ok(true)
            }
        }
    }

    async fn upload<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<bool, RpcError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut source = UploadFrames {
            reader,
            ended: false,
            broken: false,
        };

        let (resp, status) = {
            let chunks = futures_util::stream::try_unfold(&mut source, |src| async move {
                Ok::<_, RpcError>(src.next_chunk().await?.map(|chunk| (chunk, src)))
            });
            self.service.upload(chunks).await
        };

        if !source.ended && !source.broken {
            // The service stopped early; consume the rest of the client's
            // chunks so the reply is not stuck behind them.
            if let Err(e) = source.drain().await {
                debug!("draining aborted upload failed: {e}");
            }
        }

        if source.broken {
            // The peer may already be gone; report if we still can.
            let _ = write_json(writer, FrameKind::Reply, &resp).await;
            let _ = write_status(writer, &status).await;
            let _ = writer.flush().await;
            return Ok(false);
        }

        write_json(writer, FrameKind::Reply, &resp).await?;
        write_status(writer, &status).await?;
        writer.flush().await?;
        Ok(true)
    }

    async fn download<W>(&self, filename: Option<String>, writer: &mut W) -> Result<(), RpcError>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(filename) = filename else {
            write_status(writer, &Status::invalid_argument("filename is required")).await?;
            writer.flush().await?;
            return Ok(());
        };

        let status = match self.service.download(&filename).await {
            Err(status) => status,
            Ok(mut chunks) => {
                let mut status = Status::ok();
                let mut sent: u64 = 0;
                while let Some(item) = chunks.next().await {
                    match item {
                        Ok(chunk @ FileChunk::Data(_)) => {
                            // A failed write means the client went away; returning
                            // drops `chunks` and closes the file.
                            write_chunk(writer, &chunk).await?;
                            sent += chunk.content().map_or(0, |c| c.len() as u64);
                        }
                        Ok(FileChunk::Header { .. }) => {}
                        Err(failure) => {
                            status = failure;
                            break;
                        }
                    }
                }
                debug!(%filename, bytes = sent, "download stream finished");
                status
            }
        };

        write_status(writer, &status).await?;
        writer.flush().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UploadFrames
// ---------------------------------------------------------------------------

/// Reads upload chunk frames up to the `End` marker.
struct UploadFrames<'a, R> {
    reader: &'a mut R,
    /// `End` was received.
    ended: bool,
    /// The frame sequence is unusable; the connection must close.
    broken: bool,
}

impl<R: AsyncRead + Unpin> UploadFrames<'_, R> {
    async fn next_chunk(&mut self) -> Result<Option<FileChunk>, RpcError> {
        if self.ended || self.broken {
            return Ok(None);
        }

        let result = match read_frame(self.reader).await {
            Ok(Some(frame)) => match frame.kind {
                FrameKind::End => {
                    self.ended = true;
                    return Ok(None);
                }
                FrameKind::Header | FrameKind::Data => frame.into_chunk(),
                other => Err(RpcError::Protocol(format!(
                    "unexpected {other:?} frame during upload"
                ))),
            },
            Ok(None) => Err(RpcError::Protocol("connection closed mid-upload".into())),
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.broken = true;
        }
        result.map(Some)
    }

    async fn drain(&mut self) -> Result<(), RpcError> {
        while self.next_chunk().await?.is_some() {}
        Ok(())
    }
}
