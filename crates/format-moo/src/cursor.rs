//! Bounds-checked little-endian reader over an immutable byte buffer.
//!
//! A [`Cursor`] only ever moves forward. Chunk payloads are handed out as
//! sub-cursors (see [`Cursor::split`]) so the parent lands on the next
//! sibling no matter how much of the payload the child consumes.

use crate::error::MooError;

#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    /// Absolute offset of `data[0]` in the original buffer, for error reports.
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the next byte to be read.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn need(&self, n: usize) -> Result<(), MooError> {
        if n > self.remaining() {
            Err(MooError::TruncatedInput {
                offset: self.offset(),
                needed: n,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], MooError> {
        self.need(n)?;
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], MooError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), MooError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, MooError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, MooError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, MooError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, MooError> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Read a `u32` length prefix followed by that many bytes.
    pub fn read_prefixed_bytes(&mut self) -> Result<&'a [u8], MooError> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Detach the next `n` bytes as an independent cursor and advance past them.
    pub fn split(&mut self, n: usize) -> Result<Cursor<'a>, MooError> {
        let base = self.offset();
        let data = self.read_bytes(n)?;
        Ok(Cursor { data, pos: 0, base })
    }
}
