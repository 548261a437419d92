//! Bounds-checked cursor over untrusted bytes.
//!
//! Every "read a count, then read `count * stride` bytes" operation in this
//! crate goes through [`ByteReader`]. The reader carries its remaining length
//! and fails closed: it returns an error rather than ever reading past the
//! end of the buffer.

use crate::error::ContainerError;
use crate::fourcc::FourCC;

/// A forward-only reader over a byte slice that validates every access.
#[derive(Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Part code used to label errors; readers over sub-structures inherit it.
    part: FourCC,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader over `bytes`, labelling errors as belonging to `part`.
    pub fn new(part: FourCC, bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            part,
        }
    }

    /// Current offset from the start of the underlying slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Part code this reader labels its errors with.
    pub fn part(&self) -> FourCC {
        self.part
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whole underlying slice (not just the unread tail).
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn err(&self, reason: String) -> ContainerError {
        ContainerError::not_well_formed(self.part, reason)
    }

    /// Takes the next `len` bytes.
    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], ContainerError> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            self.err(format!("{what}: length {len} overflows at offset {}", self.pos))
        })?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            self.err(format!(
                "{what}: need {len} bytes at offset {}, but only {} remain",
                self.pos,
                self.remaining()
            ))
        })?;
        self.pos = end;
        Ok(slice)
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self, what: &str) -> Result<u32, ContainerError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self, what: &str) -> Result<u16, ContainerError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self, what: &str) -> Result<u8, ContainerError> {
        let b = self.take(1, what)?;
        Ok(b[0])
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self, what: &str) -> Result<u64, ContainerError> {
        let b = self.take(8, what)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads `count` little-endian `u32`s after checking `count * 4` fits in
    /// the remaining bytes.
    pub fn read_u32_array(&mut self, count: usize, what: &str) -> Result<Vec<u32>, ContainerError> {
        let byte_len = count
            .checked_mul(4)
            .ok_or_else(|| self.err(format!("{what}: count {count} overflows byte length")))?;
        let slice = self.take(byte_len, what)?;
        Ok(slice
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Creates a reader positioned at absolute `offset` in the same slice.
    pub fn fork(&self, offset: usize, what: &str) -> Result<ByteReader<'a>, ContainerError> {
        if offset > self.bytes.len() {
            return Err(self.err(format!(
                "{what}: offset {offset} is outside buffer length {}",
                self.bytes.len()
            )));
        }
        Ok(ByteReader {
            bytes: self.bytes,
            pos: offset,
            part: self.part,
        })
    }

    /// Reads a NUL-terminated UTF-8 string starting at absolute `offset`.
    pub fn read_cstring_at(&self, offset: usize, what: &str) -> Result<&'a str, ContainerError> {
        let tail = self.bytes.get(offset..).ok_or_else(|| {
            self.err(format!(
                "{what}: offset {offset} is outside buffer length {}",
                self.bytes.len()
            ))
        })?;
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.err(format!("{what}: string at offset {offset} is missing a null terminator")))?;
        core::str::from_utf8(&tail[..nul])
            .map_err(|_| self.err(format!("{what}: string at offset {offset} is not valid UTF-8")))
    }

    /// Asserts the reader consumed the slice exactly.
    ///
    /// Walking a part means adding up expected consumed bytes from declared
    /// counts; a leftover tail is just as much a well-formedness failure as a
    /// premature end.
    pub fn expect_end(&self, what: &str) -> Result<(), ContainerError> {
        if self.pos != self.bytes.len() {
            return Err(self.err(format!(
                "{what}: {} trailing bytes after declared content",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
