//! Error types for the RPC channel.

use filegate_protocol::{MAX_FRAME_SIZE, Status, StatusCode};

/// Errors produced by the RPC channel.
///
/// [`RpcError::Status`] is a failure reported by the service; every other
/// variant means the channel itself failed.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("unknown frame kind: {0:#04x}")]
    UnknownFrame(u8),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("{message}")]
    Status { code: StatusCode, message: String },
}

impl RpcError {
    /// Returns the service status code, if this error carries one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        Self::Status {
            code: status.code,
            message: status.message,
        }
    }
}
