//! Growable byte store backing the session send and receive paths.
//!
//! [`ByteBuffer`] keeps a zero-initialised backing vector whose length is the
//! buffer's capacity, a logical `size` and a read cursor (`offset`). The
//! invariant `offset <= size <= capacity` holds after every operation.
//! Capacity only grows; [`ByteBuffer::clear`] keeps the allocation so that a
//! reconnecting session does not reallocate its buffers.

use thiserror::Error;

/// Errors raised by [`ByteBuffer`] range operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// The requested range does not fit inside the logical content.
    #[error("range {offset}..{offset}+{len} exceeds buffer size {size}")]
    OutOfBounds {
        /// Start of the requested range.
        offset: usize,
        /// Length of the requested range.
        len: usize,
        /// Logical size of the buffer when the request was made.
        size: usize,
    },
}

/// A growable byte buffer with an explicit read cursor.
///
/// # Examples
///
/// ```
/// use lanwire::buffer::ByteBuffer;
///
/// let mut buf = ByteBuffer::with_capacity(4);
/// buf.append(b"hello world");
/// buf.remove(0, 6).expect("range is in bounds");
/// assert_eq!(buf.as_slice(), b"world");
/// assert!(buf.capacity() >= 11);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    size: usize,
    offset: usize,
}

impl ByteBuffer {
    /// Create an empty buffer without allocating.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty buffer with `capacity` bytes of backing storage.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            size: 0,
            offset: 0,
        }
    }

    /// Create a buffer holding a copy of `bytes`.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::with_capacity(bytes.len());
        buf.append(bytes);
        buf
    }

    /// Length of the backing storage.
    #[must_use]
    pub fn capacity(&self) -> usize { self.data.len() }

    /// Logical length of the content.
    #[must_use]
    pub fn len(&self) -> usize { self.size }

    /// Returns `true` when the buffer holds no content.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.size == 0 }

    /// Current read cursor.
    #[must_use]
    pub fn offset(&self) -> usize { self.offset }

    /// Unread content, `[offset, size)`.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] { &self.data[self.offset..self.size] }

    /// Borrow `len` unread bytes starting `off` bytes past the read cursor.
    ///
    /// `extract(0, buf.as_slice().len())` is the same view as
    /// [`as_slice`](Self::as_slice).
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if the range runs past the size.
    pub fn extract(&self, off: usize, len: usize) -> Result<&[u8], BufferError> {
        let start = self.offset.checked_add(off).ok_or(BufferError::OutOfBounds {
            offset: off,
            len,
            size: self.size,
        })?;
        let end = self.checked_end(start, len)?;
        Ok(&self.data[start..end])
    }

    /// Append `bytes`, growing the backing storage if needed.
    ///
    /// Returns the number of bytes appended.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let end = self.size + bytes.len();
        self.reserve(end);
        self.data[self.size..end].copy_from_slice(bytes);
        self.size = end;
        bytes.len()
    }

    /// Ensure the backing storage holds at least `capacity` bytes.
    ///
    /// Growth allocates `max(capacity, 2 * current)` and copies the existing
    /// content, so repeated appends are amortised O(1).
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.data.len() {
            return;
        }
        let mut grown = vec![0; capacity.max(self.data.len() * 2)];
        grown[..self.size].copy_from_slice(&self.data[..self.size]);
        self.data = grown;
    }

    /// Delete `len` bytes at `off`, shifting the remainder left in place.
    ///
    /// The read cursor keeps pointing at the same logical byte when it lies
    /// after the removed range, and moves to `off` when it lay inside it.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfBounds`] if `off + len` exceeds the size.
    pub fn remove(&mut self, off: usize, len: usize) -> Result<(), BufferError> {
        let end = self.checked_end(off, len)?;
        self.data.copy_within(end..self.size, off);
        self.size -= len;
        if self.offset >= end {
            self.offset -= len;
        } else if self.offset > off {
            self.offset = off;
        }
        Ok(())
    }

    /// Advance the read cursor by up to `len` bytes.
    pub fn shift(&mut self, len: usize) { self.offset = (self.offset + len).min(self.size); }

    /// Reset size and cursor, keeping the allocation for reuse.
    pub fn clear(&mut self) {
        self.size = 0;
        self.offset = 0;
    }

    /// Drop the backing storage entirely.
    pub fn release(&mut self) { *self = Self::default(); }

    /// Writable space past the logical end, used as a socket read target.
    pub(crate) fn spare_mut(&mut self) -> &mut [u8] { &mut self.data[self.size..] }

    /// Mark `len` bytes of [`spare_mut`](Self::spare_mut) as filled.
    pub(crate) fn commit(&mut self, len: usize) {
        debug_assert!(self.size + len <= self.data.len(), "commit past capacity");
        self.size = (self.size + len).min(self.data.len());
    }

    fn checked_end(&self, off: usize, len: usize) -> Result<usize, BufferError> {
        off.checked_add(len)
            .filter(|end| *end <= self.size)
            .ok_or(BufferError::OutOfBounds {
                offset: off,
                len,
                size: self.size,
            })
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("capacity", &self.data.len())
            .finish()
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] { self.as_slice() }
}
