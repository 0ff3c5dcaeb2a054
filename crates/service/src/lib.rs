//! Transfer service.
//!
//! Implements the three transfer operations on top of [`LocalStorage`],
//! independent of any transport. Failures never escape as errors: each
//! operation converts them into a [`Status`] plus a safe payload, which
//! the RPC layer forwards to the caller.
//!
//! [`LocalStorage`]: filegate_storage::LocalStorage
//! [`Status`]: filegate_protocol::Status

mod service;

pub use service::{DownloadStream, FileService};

/// Errors that abort an upload.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Protocol(String),

    #[error(transparent)]
    Storage(#[from] filegate_storage::StorageError),

    #[error("upload stream interrupted: {0}")]
    Interrupted(String),
}
