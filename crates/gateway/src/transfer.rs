//! Backend seam for the gateway handlers.

use std::future::Future;
use std::io;
use std::pin::Pin;

use futures_util::stream::BoxStream;

use filegate_protocol::{FileChunk, UploadResponse};
use filegate_rpc::{ContentStream, RpcClient, RpcError};

/// Boxed future returned by [`FileTransfer`] methods.
pub type TransferFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RpcError>> + Send + 'a>>;

/// Upload chunks produced from a request body.
pub type ChunkStream<'a> = BoxStream<'a, io::Result<FileChunk>>;

/// Operations the gateway forwards to the transfer service.
pub trait FileTransfer: Send + Sync + 'static {
    fn list_files(&self) -> TransferFuture<'_, Vec<String>>;

    /// Streams `chunks` (header first) to the service.
    fn upload_file<'a>(&'a self, chunks: ChunkStream<'a>) -> TransferFuture<'a, UploadResponse>;

    /// Opens a download. A missing file is reported by the first stream item.
    fn download_file(&self, filename: String) -> TransferFuture<'_, ContentStream>;
}

impl FileTransfer for RpcClient {
    fn list_files(&self) -> TransferFuture<'_, Vec<String>> {
        Box::pin(RpcClient::list_files(self))
    }

    fn upload_file<'a>(&'a self, chunks: ChunkStream<'a>) -> TransferFuture<'a, UploadResponse> {
        Box::pin(RpcClient::upload_file(self, chunks))
    }

    fn download_file(&self, filename: String) -> TransferFuture<'_, ContentStream> {
        Box::pin(async move { RpcClient::download_file(self, &filename).await })
    }
}
