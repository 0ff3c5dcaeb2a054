//! Local-disk storage backend.
//!
//! A single flat directory holds every stored file. Uploads append to the
//! named file chunk by chunk; downloads read it back sequentially in
//! fixed-size chunks. Nothing is cached beyond the chunk in flight.

mod local;
mod reader;
mod validation;

pub use local::{AppendHandle, LocalStorage};
pub use reader::ChunkReader;
pub use validation::validate_filename;

/// Errors produced by the storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File '{0}' not found.")]
    NotFound(String),

    #[error("invalid filename: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
