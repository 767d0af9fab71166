//! Error types for `lanwire` client operations.

use crate::session::SessionError;

/// Errors returned by [`LanClient`](super::LanClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying session failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    /// The server has not assigned this client an id yet, or the connection
    /// is down.
    #[error("client is not connected")]
    NotConnected,
    /// No peer with this nickname is on the roster.
    #[error("no peer named {0:?}")]
    UnknownPeer(String),
    /// The session refused the frame (disconnecting or over its send limit).
    #[error("frame was not queued")]
    SendRejected,
}
