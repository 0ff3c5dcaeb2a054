//! Streaming RPC channel between the gateway and the transfer service.
//!
//! One TCP connection carries a sequence of calls. Each call opens with a
//! JSON `Call` frame, may stream raw chunk frames in either direction, and
//! always ends with a `Status` frame from the server.
//!
//! # Wire format
//!
//! See [`wire`] module for the frame layout.

pub mod client;
pub mod error;
pub mod server;
pub mod wire;

pub use client::{ContentStream, RpcClient};
pub use error::RpcError;
pub use server::RpcServer;

use std::time::Duration;

/// TCP read/write buffer size (64 KB).
pub const TCP_BUFFER_SIZE: usize = 64 * 1024;

/// Default timeout for the TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
