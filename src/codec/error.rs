//! Error types for the frame codec.
//!
//! Errors are split by the layer that detects them:
//!
//! - [`FramingError`]: the length prefix and frame boundaries.
//! - [`ProtocolError`]: the body of a frame whose boundaries are known.
//! - [`EofError`]: the stream ended inside a frame.
//! - [`CodecError`]: top-level enum wrapping the above plus I/O errors.
//!
//! [`CodecError::is_incomplete`] separates "wait for more bytes" from errors
//! that corrupt the stream and must end the session.

use std::io;

use thiserror::Error;

/// Errors detected while locating frame boundaries.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Fewer bytes than a length prefix are available.
    #[error("incomplete length prefix: have {have} of 4 bytes")]
    IncompletePrefix {
        /// Bytes currently available.
        have: usize,
    },

    /// The prefix declares more bytes than are available.
    #[error("truncated frame: declared {declared} bytes, {available} available")]
    Truncated {
        /// Body length declared by the prefix.
        declared: usize,
        /// Body bytes currently available.
        available: usize,
    },

    /// The prefix holds a negative length.
    #[error("negative frame length {length}")]
    NegativeLength {
        /// Raw prefix value.
        length: i32,
    },

    /// The frame exceeds the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Size of the offending frame body.
        size: usize,
        /// Maximum accepted body size.
        max: usize,
    },
}

/// Errors detected while parsing the body of a delimited frame.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The system tag byte is not part of the vocabulary.
    #[error("unknown system tag {byte}")]
    UnknownTag {
        /// Offending byte.
        byte: u8,
    },

    /// A section length field is missing or points past the frame body.
    #[error("{section} section overruns frame body: need {need}, have {have}")]
    SectionOverrun {
        /// Section being parsed.
        section: &'static str,
        /// Bytes required by the section.
        need: usize,
        /// Bytes left in the body.
        have: usize,
    },

    /// A section length field is negative.
    #[error("negative {section} section length {length}")]
    NegativeSectionLength {
        /// Section being parsed.
        section: &'static str,
        /// Raw length value.
        length: i32,
    },

    /// The text section is not valid UTF-8.
    #[error("text section is not valid UTF-8")]
    InvalidUtf8,

    /// Bytes remain in the body after the raw section.
    #[error("{count} trailing bytes after raw section")]
    TrailingBytes {
        /// Number of unparsed bytes.
        count: usize,
    },
}

/// End-of-stream conditions seen by the tokio codec adapter.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The stream closed inside a length prefix.
    #[error("premature EOF during prefix: {bytes_received} of 4 bytes")]
    MidPrefix {
        /// Prefix bytes received before EOF.
        bytes_received: usize,
    },

    /// The stream closed inside a frame body.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Body bytes received before EOF.
        bytes_received: usize,
        /// Declared body length.
        expected: usize,
    },
}

/// Top-level codec error.
///
/// # Examples
///
/// ```
/// use lanwire::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::Truncated {
///     declared: 50,
///     available: 10,
/// });
/// assert!(err.is_incomplete());
/// assert!(!err.should_disconnect());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame boundary error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Frame body error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stream ended inside a frame.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns `true` when more bytes could complete the frame.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::Framing(FramingError::IncompletePrefix { .. } | FramingError::Truncated { .. })
        )
    }

    /// Returns `true` when the stream can no longer be trusted.
    #[must_use]
    pub fn should_disconnect(&self) -> bool { !self.is_incomplete() }

    /// Error category for logs and metrics: `framing`, `protocol`, `io` or `eof`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Protocol(_) => "protocol",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Protocol(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
