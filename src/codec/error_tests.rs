//! Unit tests for codec error classification.

use std::io;

use rstest::rstest;

use super::{CodecError, EofError, FramingError, ProtocolError};

#[rstest]
#[case::prefix(FramingError::IncompletePrefix { have: 2 })]
#[case::truncated(FramingError::Truncated { declared: 40, available: 8 })]
fn incomplete_framing_waits_for_more_bytes(#[case] err: FramingError) {
    let err = CodecError::Framing(err);
    assert!(err.is_incomplete());
    assert!(!err.should_disconnect());
}

#[rstest]
#[case::negative(CodecError::Framing(FramingError::NegativeLength { length: -1 }))]
#[case::oversized(CodecError::Framing(FramingError::OversizedFrame { size: 10, max: 4 }))]
#[case::unknown_tag(CodecError::Protocol(ProtocolError::UnknownTag { byte: 42 }))]
#[case::utf8(CodecError::Protocol(ProtocolError::InvalidUtf8))]
#[case::io(CodecError::Io(io::Error::other("boom")))]
fn corrupt_stream_requires_disconnect(#[case] err: CodecError) {
    assert!(!err.is_incomplete());
    assert!(err.should_disconnect());
}

#[test]
fn error_type_names_category() {
    assert_eq!(
        CodecError::Framing(FramingError::IncompletePrefix { have: 0 }).error_type(),
        "framing"
    );
    assert_eq!(
        CodecError::Protocol(ProtocolError::TrailingBytes { count: 1 }).error_type(),
        "protocol"
    );
    assert_eq!(
        CodecError::Eof(EofError::MidPrefix { bytes_received: 1 }).error_type(),
        "eof"
    );
}

#[test]
fn codec_error_converts_to_io_error_with_correct_kind() {
    let io_err: io::Error = CodecError::Protocol(ProtocolError::InvalidUtf8).into();
    assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

    let io_err: io::Error = CodecError::Eof(EofError::MidFrame {
        bytes_received: 3,
        expected: 12,
    })
    .into();
    assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    assert!(io_err.to_string().contains("12"));
}
