//! Errors raised by the session engine.

use std::{any::Any, io, time::Duration};

use thiserror::Error;

use super::SessionState;
use crate::{buffer::BufferError, codec::CodecError};

/// Errors surfaced through [`SessionHandler::on_error`](super::SessionHandler::on_error)
/// or returned from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Socket error.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// Growing the receive buffer would exceed the configured limit.
    #[error("receive buffer would grow to {requested} bytes, limit is {limit}")]
    ReceiveBufferFull {
        /// Capacity the next read needed.
        requested: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Queuing a send would exceed the configured limit.
    #[error("send of {len} bytes rejected: {pending} pending, limit is {limit}")]
    SendBufferFull {
        /// Bytes already queued.
        pending: usize,
        /// Size of the rejected send.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The operation is not valid in the current state.
    #[error("session is {0}")]
    InvalidState(SessionState),

    /// The outbound connect did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A peer sent a malformed frame.
    #[error("malformed frame: {0}")]
    Codec(#[from] CodecError),

    /// A buffer range operation failed.
    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// A session callback panicked inside an I/O loop.
    #[error("session task panicked: {0}")]
    Panicked(String),
}

impl SessionError {
    pub(crate) fn aborted() -> Self { Self::Io(io::ErrorKind::ConnectionAborted.into()) }

    /// Returns `true` for socket errors that are natural artefacts of a
    /// teardown: aborted, refused, reset or shut-down connections.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io;
    ///
    /// use lanwire::session::SessionError;
    ///
    /// let reset = SessionError::Io(io::ErrorKind::ConnectionReset.into());
    /// assert!(reset.is_disconnect_noise());
    /// let denied = SessionError::Io(io::ErrorKind::PermissionDenied.into());
    /// assert!(!denied.is_disconnect_noise());
    /// ```
    #[must_use]
    pub fn is_disconnect_noise(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Short category name for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::ReceiveBufferFull { .. } => "receive_buffer_full",
            Self::SendBufferFull { .. } => "send_buffer_full",
            Self::InvalidState(_) => "invalid_state",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Codec(e) => e.error_type(),
            Self::Buffer(_) => "buffer",
            Self::Panicked(_) => "panic",
        }
    }

    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&'static str>().copied())
            .map_or_else(|| format!("{payload:?}"), str::to_owned);
        Self::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::aborted(io::ErrorKind::ConnectionAborted, true)]
    #[case::refused(io::ErrorKind::ConnectionRefused, true)]
    #[case::reset(io::ErrorKind::ConnectionReset, true)]
    #[case::shutdown(io::ErrorKind::BrokenPipe, true)]
    #[case::timed_out(io::ErrorKind::TimedOut, false)]
    #[case::other(io::ErrorKind::Other, false)]
    fn classifies_socket_errors(#[case] kind: io::ErrorKind, #[case] noise: bool) {
        assert_eq!(SessionError::Io(kind.into()).is_disconnect_noise(), noise);
    }

    #[test]
    fn resource_errors_are_never_noise() {
        let err = SessionError::ReceiveBufferFull {
            requested: 32,
            limit: 16,
        };
        assert!(!err.is_disconnect_noise());
        assert_eq!(err.kind(), "receive_buffer_full");
    }

    #[test]
    fn panic_payloads_are_formatted() {
        let err = SessionError::from_panic(&"boom");
        assert_eq!(err.to_string(), "session task panicked: boom");
        let err = SessionError::from_panic(&String::from("bang"));
        assert!(err.to_string().ends_with("bang"));
        let err = SessionError::from_panic(&5_u32);
        assert!(err.to_string().contains("Any"));
    }
}
