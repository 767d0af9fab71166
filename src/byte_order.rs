//! Helpers for the wire's little-endian integer fields.
//!
//! Every integer on the `lanwire` wire is a fixed-width little-endian `i32`.
//! Keeping the conversions here scopes the Clippy expectation to the two
//! places that touch raw endianness.

/// Width in bytes of every length field on the wire.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Serialise an `i32` length field.
///
/// # Examples
///
/// ```
/// use lanwire::byte_order::write_wire_i32;
///
/// assert_eq!(write_wire_i32(0x1234_5678), [0x78, 0x56, 0x34, 0x12]);
/// ```
#[must_use]
pub fn write_wire_i32(value: i32) -> [u8; LENGTH_FIELD_SIZE] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The wire format is defined as little-endian."
    )]
    value.to_le_bytes()
}

/// Parse an `i32` length field from its on-wire representation.
///
/// # Examples
///
/// ```
/// use lanwire::byte_order::read_wire_i32;
///
/// assert_eq!(read_wire_i32([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
/// assert_eq!(read_wire_i32([0xFF, 0xFF, 0xFF, 0xFF]), -1);
/// ```
#[must_use]
pub fn read_wire_i32(bytes: [u8; LENGTH_FIELD_SIZE]) -> i32 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The wire format is defined as little-endian."
    )]
    i32::from_le_bytes(bytes)
}

/// Read the length field at the start of `src`, if enough bytes are present.
#[must_use]
pub fn peek_wire_i32(src: &[u8]) -> Option<i32> {
    src.get(..LENGTH_FIELD_SIZE)
        .and_then(|slice| <[u8; LENGTH_FIELD_SIZE]>::try_from(slice).ok())
        .map(read_wire_i32)
}
