//! Wire protocol types shared by the gateway and the transfer service.
//!
//! The transfer service speaks a small streaming RPC: three methods
//! (list, upload, download) whose payloads are JSON envelopes plus raw
//! [`FileChunk`] frames. This crate only defines the types; framing lives
//! in `filegate-rpc`.

pub mod envelope;
pub mod messages;
pub mod types;

pub use envelope::{Call, Method, Status, StatusCode};
pub use messages::{ListFilesResponse, UploadResponse};
pub use types::FileChunk;

/// Size of one content chunk, for both upload and download.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Largest payload accepted in a single frame (1 MiB).
///
/// Content chunks are far smaller; this bounds JSON envelopes and guards
/// against a peer announcing an absurd length.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Message returned in [`UploadResponse`] when an upload completes.
pub const UPLOAD_SUCCEEDED: &str = "upload succeeded";

/// Message returned in [`UploadResponse`] when an upload is aborted.
pub const UPLOAD_FAILED: &str = "upload failed";
