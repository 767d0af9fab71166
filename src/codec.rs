//! Binary framing for [`Message`] values.
//!
//! Every frame is a little-endian `i32` length prefix followed by a body:
//!
//! ```text
//! [i32 frame length]
//!   [u8 system tag][u8 user tag][u8 from id][u8 to id]
//!   [i32 text length][UTF-8 text]
//!   [i32 raw length][raw bytes]
//! ```
//!
//! The prefix counts every body byte and excludes itself, so a reader can split
//! several frames that arrived back to back in one read. [`decode`] parses one
//! frame and returns the bytes that follow it; [`frames`] walks a whole read
//! and stops cleanly in front of an incomplete trailing frame, which the
//! session keeps buffered until the rest arrives.
//!
//! [`MessageCodec`] adapts the same format to `tokio_util`'s
//! [`Decoder`]/[`Encoder`] traits for use with `Framed` streams.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    byte_order::{LENGTH_FIELD_SIZE, peek_wire_i32, read_wire_i32, write_wire_i32},
    message::Message,
    tag::Tag,
};

pub mod error;

pub use error::{CodecError, EofError, FramingError, ProtocolError};

/// Size of the fixed header: system tag, user tag, from id and to id.
pub const HEADER_SIZE: usize = 4;

/// Smallest valid body: header plus two empty length-prefixed sections.
pub const MIN_BODY_SIZE: usize = HEADER_SIZE + 2 * LENGTH_FIELD_SIZE;

/// Largest body the tokio adapter accepts by default (16 MiB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

const MAX_WIRE_LENGTH: usize = 0x7FFF_FFFF;

/// Total encoded size of `msg`, prefix included.
#[must_use]
pub fn encoded_len(msg: &Message) -> usize { LENGTH_FIELD_SIZE + body_len(msg) }

fn body_len(msg: &Message) -> usize { MIN_BODY_SIZE + msg.text.len() + msg.raw.len() }

/// Append the wire encoding of `msg` to `dst`.
///
/// # Errors
///
/// Returns [`FramingError::OversizedFrame`] if a length does not fit the
/// wire's `i32` fields.
pub fn encode(msg: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
    let body = body_len(msg);
    let prefix = wire_length(body)?;
    let text_len = wire_length(msg.text.len())?;
    let raw_len = wire_length(msg.raw.len())?;

    dst.reserve(LENGTH_FIELD_SIZE + body);
    dst.put_slice(&write_wire_i32(prefix));
    dst.put_u8(msg.system_tag.into());
    dst.put_u8(msg.user_tag);
    dst.put_u8(msg.from_id);
    dst.put_u8(msg.to_id);
    dst.put_slice(&write_wire_i32(text_len));
    dst.put_slice(msg.text.as_bytes());
    dst.put_slice(&write_wire_i32(raw_len));
    dst.put_slice(&msg.raw);
    Ok(())
}

/// Encode `msg` into a standalone buffer.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_to_bytes(msg: &Message) -> Result<Bytes, CodecError> {
    let mut dst = BytesMut::with_capacity(encoded_len(msg));
    encode(msg, &mut dst)?;
    Ok(dst.freeze())
}

fn wire_length(len: usize) -> Result<i32, CodecError> {
    i32::try_from(len).map_err(|_| {
        FramingError::OversizedFrame {
            size: len,
            max: MAX_WIRE_LENGTH,
        }
        .into()
    })
}

/// Decode the first frame in `src`.
///
/// Returns the message and the bytes following it, which may hold further
/// coalesced frames.
///
/// # Errors
///
/// Returns [`FramingError::IncompletePrefix`] or [`FramingError::Truncated`]
/// when `src` does not hold a whole frame, and another [`CodecError`] when the
/// frame is malformed.
///
/// # Examples
///
/// ```
/// use lanwire::{
///     codec::{decode, encode_to_bytes},
///     message::Message,
///     tag::Tag,
/// };
///
/// let a = Message::new(Tag::ServerToAll).with_text("a");
/// let b = Message::new(Tag::ServerToAll).with_text("b");
/// let mut wire = encode_to_bytes(&a).expect("encode").to_vec();
/// wire.extend_from_slice(&encode_to_bytes(&b).expect("encode"));
///
/// let (first, rest) = decode(&wire).expect("first frame");
/// let (second, rest) = decode(rest).expect("second frame");
/// assert_eq!((first, second), (a, b));
/// assert!(rest.is_empty());
/// ```
pub fn decode(src: &[u8]) -> Result<(Message, &[u8]), CodecError> {
    let declared = frame_length(src)?;
    let rest = &src[LENGTH_FIELD_SIZE..];
    if declared > rest.len() {
        return Err(FramingError::Truncated {
            declared,
            available: rest.len(),
        }
        .into());
    }
    let (body, remaining) = rest.split_at(declared);
    Ok((parse_body(body)?, remaining))
}

/// Decode every frame in `src`, requiring it to end on a frame boundary.
///
/// # Errors
///
/// Returns the first [`CodecError`] met, including truncation of the last
/// frame.
pub fn decode_all(mut src: &[u8]) -> Result<Vec<Message>, CodecError> {
    let mut messages = Vec::new();
    while !src.is_empty() {
        let (msg, remaining) = decode(src)?;
        messages.push(msg);
        src = remaining;
    }
    Ok(messages)
}

/// Body length declared by the prefix at the start of `src`.
fn frame_length(src: &[u8]) -> Result<usize, CodecError> {
    let length =
        peek_wire_i32(src).ok_or(FramingError::IncompletePrefix { have: src.len() })?;
    usize::try_from(length).map_err(|_| FramingError::NegativeLength { length }.into())
}

fn parse_body(body: &[u8]) -> Result<Message, CodecError> {
    let mut reader = BodyReader { rest: body };
    let header = reader.take(HEADER_SIZE, "header")?;
    let system_tag =
        Tag::try_from(header[0]).map_err(|_| ProtocolError::UnknownTag { byte: header[0] })?;
    let text = reader.take_section("text")?;
    let text = std::str::from_utf8(text).map_err(|_| ProtocolError::InvalidUtf8)?;
    let raw = reader.take_section("raw")?;
    if !reader.rest.is_empty() {
        return Err(ProtocolError::TrailingBytes {
            count: reader.rest.len(),
        }
        .into());
    }
    Ok(Message {
        system_tag,
        user_tag: header[1],
        from_id: header[2],
        to_id: header[3],
        text: text.to_owned(),
        raw: Bytes::copy_from_slice(raw),
    })
}

struct BodyReader<'a> {
    rest: &'a [u8],
}

impl<'a> BodyReader<'a> {
    fn take(&mut self, need: usize, section: &'static str) -> Result<&'a [u8], ProtocolError> {
        if need > self.rest.len() {
            return Err(ProtocolError::SectionOverrun {
                section,
                need,
                have: self.rest.len(),
            });
        }
        let (head, tail) = self.rest.split_at(need);
        self.rest = tail;
        Ok(head)
    }

    fn take_section(&mut self, section: &'static str) -> Result<&'a [u8], ProtocolError> {
        let field = self.take(LENGTH_FIELD_SIZE, section)?;
        let mut bytes = [0; LENGTH_FIELD_SIZE];
        bytes.copy_from_slice(field);
        let length = read_wire_i32(bytes);
        let len = usize::try_from(length)
            .map_err(|_| ProtocolError::NegativeSectionLength { section, length })?;
        self.take(len, section)
    }
}

/// Iterator over the complete frames at the start of a receive buffer.
///
/// Iteration ends at the end of the input or in front of an incomplete
/// trailing frame; [`Frames::consumed`] then reports how many bytes were
/// fully decoded. A malformed frame is yielded as an error once, after which
/// the iterator is exhausted.
#[derive(Debug)]
pub struct Frames<'a> {
    remaining: &'a [u8],
    consumed: usize,
    max_frame_length: Option<usize>,
}

/// Walk the frames in `src`.
///
/// # Examples
///
/// ```
/// use lanwire::{
///     codec::{encode_to_bytes, frames},
///     message::Message,
///     tag::Tag,
/// };
///
/// let wire = encode_to_bytes(&Message::new(Tag::Id).with_from(3)).expect("encode");
/// let mut read = wire.to_vec();
/// read.extend_from_slice(&wire[..5]);
///
/// let mut iter = frames(&read);
/// assert_eq!(iter.next().map(|m| m.ok().map(|m| m.from_id)), Some(Some(3)));
/// assert!(iter.next().is_none());
/// assert_eq!(iter.consumed(), wire.len());
/// assert_eq!(iter.pending().len(), 5);
/// ```
#[must_use]
pub fn frames(src: &[u8]) -> Frames<'_> {
    Frames {
        remaining: src,
        consumed: 0,
        max_frame_length: None,
    }
}

impl<'a> Frames<'a> {
    /// Reject frames whose body exceeds `max` bytes instead of waiting for them.
    #[must_use]
    pub fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = Some(max);
        self
    }

    /// Bytes decoded so far.
    #[must_use]
    pub fn consumed(&self) -> usize { self.consumed }

    /// Bytes not yet decoded.
    #[must_use]
    pub fn pending(&self) -> &'a [u8] { self.remaining }

    fn check_limit(&self) -> Result<(), CodecError> {
        if let Some(max) = self.max_frame_length
            && let Ok(size) = frame_length(self.remaining)
            && size > max
        {
            return Err(FramingError::OversizedFrame { size, max }.into());
        }
        Ok(())
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<Message, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let decoded = self.check_limit().and_then(|()| decode(self.remaining));
        match decoded {
            Ok((msg, rest)) => {
                self.consumed += self.remaining.len() - rest.len();
                self.remaining = rest;
                Some(Ok(msg))
            }
            Err(e) if e.is_incomplete() => None,
            Err(e) => {
                self.remaining = &[];
                Some(Err(e))
            }
        }
    }
}

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_BODY_SIZE, MAX_FRAME_LENGTH)
}

/// `tokio_util` codec for [`Message`] frames.
#[derive(Clone, Debug)]
pub struct MessageCodec {
    max_frame_length: usize,
}

impl MessageCodec {
    /// Construct a codec accepting bodies up to `max_frame_length` bytes.
    ///
    /// The limit is clamped to `MIN_BODY_SIZE..=MAX_FRAME_LENGTH`.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: clamp_frame_length(max_frame_length),
        }
    }

    /// Maximum accepted body length.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }
}

impl Default for MessageCodec {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let declared = match frame_length(src) {
            Ok(declared) => declared,
            Err(e) if e.is_incomplete() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if declared > self.max_frame_length {
            return Err(CodecError::from(FramingError::OversizedFrame {
                size: declared,
                max: self.max_frame_length,
            })
            .into());
        }
        let total = LENGTH_FIELD_SIZE + declared;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let frame = src.split_to(total);
        Ok(Some(parse_body(&frame[LENGTH_FIELD_SIZE..])?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        if let Some(msg) = self.decode(src)? {
            return Ok(Some(msg));
        }
        let eof = match frame_length(src) {
            Ok(expected) => EofError::MidFrame {
                bytes_received: src.len().saturating_sub(LENGTH_FIELD_SIZE),
                expected,
            },
            Err(_) => EofError::MidPrefix {
                bytes_received: src.len(),
            },
        };
        Err(CodecError::Eof(eof).into())
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = body_len(&item);
        if size > self.max_frame_length {
            return Err(CodecError::from(FramingError::OversizedFrame {
                size,
                max: self.max_frame_length,
            })
            .into());
        }
        encode(&item, dst).map_err(io::Error::from)
    }
}
