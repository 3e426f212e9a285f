//! Position-tracking reader over an in-memory buffer.

use crate::errors::{DecodeError, ErrorKind};
use crate::varint::{decode_varint, VarintError};

/// Reads primitive values from a byte slice.
///
/// The cursor position never moves past the end of the buffer. A read which
/// would require more bytes than remain fails with
/// [`ErrorKind::TruncatedInput`] and leaves the position unchanged.
///
/// Cursors over embedded messages are created with
/// [`sub_cursor`](ByteCursor::sub_cursor). They remember the offset of their
/// slice in the top-level buffer, so that [`offset`](ByteCursor::offset)
/// and error offsets are always relative to the start of the input.
#[derive(Clone, Debug)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,

    /// Offset of `buf` within the top-level input.
    base: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            base: 0,
        }
    }

    /// Return the current position relative to the start of the top-level
    /// input.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Return the current position within this cursor's buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Create a cursor over a slice of the input that begins at
    /// `absolute_offset` in the top-level buffer.
    ///
    /// This is used for the contents of length-delimited values after they
    /// have been read with [`read_length_delimited`](Self::read_length_delimited).
    pub fn sub_cursor(slice: &'a [u8], absolute_offset: usize) -> Self {
        Self {
            buf: slice,
            pos: 0,
            base: absolute_offset,
        }
    }

    fn truncated(&self) -> DecodeError {
        DecodeError::new(ErrorKind::TruncatedInput, self.offset())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(self.truncated());
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read a varint.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        match decode_varint(&self.buf[self.pos..]) {
            Ok((value, len)) => {
                self.pos += len;
                Ok(value)
            }
            Err(VarintError::Truncated) => Err(self.truncated()),
            Err(VarintError::Overflow) => {
                Err(DecodeError::new(ErrorKind::VarintOverflow, self.offset()))
            }
        }
    }

    /// Read a 4-byte little-endian value.
    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(bytes))
    }

    /// Read an 8-byte little-endian value.
    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.take(len)
    }

    /// Read a varint length followed by that many bytes.
    ///
    /// If the length prefix is read but the data is truncated, the position
    /// is restored to the start of the length prefix.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            let err = self.truncated();
            self.pos = start;
            return Err(err);
        }
        self.take(len as usize)
    }
}
