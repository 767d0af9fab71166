//! Errors raised by [`LanServer`](super::LanServer) operations.

use std::io;

use thiserror::Error;

/// Errors returned by the server builder and [`ServerHandle`](super::ServerHandle).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or configuring the listener failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),

    /// No client holds the given id.
    #[error("no client with id {0}")]
    UnknownClient(u8),

    /// The client's session refused the frame (disconnecting or over its send limit).
    #[error("client {0} did not accept the frame")]
    SendRejected(u8),
}
