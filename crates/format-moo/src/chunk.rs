//! Chunk framing: a 4-byte ASCII tag, a `u32` length, then the payload.
//!
//! Every consumer walks chunks through [`Cursor::next_chunk`], which hands
//! back the payload as its own cursor and leaves the parent positioned at
//! `payload_end`. Unknown or over-long payloads therefore never disturb
//! sibling parsing.

use std::fmt;

use crate::cursor::Cursor;
use crate::error::MooError;

/// Size of a chunk header in bytes.
pub const CHUNK_HEADER_LEN: usize = 8;

/// A four character chunk type tag, space padded.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    pub const FILE_HEADER: Self = Self(*b"MOO ");
    pub const FILE_METADATA: Self = Self(*b"META");
    pub const TEST: Self = Self(*b"TEST");
    pub const NAME: Self = Self(*b"NAME");
    pub const BYTES: Self = Self(*b"BYTS");
    pub const INITIAL_STATE: Self = Self(*b"INIT");
    pub const FINAL_STATE: Self = Self(*b"FINA");
    pub const REGISTERS_16: Self = Self(*b"REGS");
    pub const REGISTERS_32: Self = Self(*b"RG32");
    pub const MASKS_16: Self = Self(*b"RMSK");
    pub const MASKS_32: Self = Self(*b"RM32");
    pub const RAM: Self = Self(*b"RAM ");
    pub const QUEUE: Self = Self(*b"QUEU");
    pub const EFFECTIVE_ADDRESS_32: Self = Self(*b"EA32");
    pub const CYCLES: Self = Self(*b"CYCL");
    pub const EXCEPTION: Self = Self(*b"EXCP");
    pub const HASH: Self = Self(*b"HASH");
    pub const GENERATOR_METADATA: Self = Self(*b"GMET");

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.as_bytes() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkTag(\"{self}\")")
    }
}

/// Position of a chunk within the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: ChunkTag,
    pub length: u32,
    /// Absolute offset of the first payload byte.
    pub payload_start: usize,
    /// Absolute offset one past the last payload byte (the next sibling's tag).
    pub payload_end: usize,
}

/// A chunk whose payload has been detached from the parent cursor.
#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    pub header: ChunkHeader,
    pub payload: Cursor<'a>,
}

impl Chunk<'_> {
    pub fn tag(&self) -> ChunkTag {
        self.header.tag
    }
}

impl<'a> Cursor<'a> {
    /// Read a chunk header and detach its payload.
    ///
    /// On success the cursor sits at `payload_end`. A length that runs past
    /// the enclosing span is reported as [`MooError::TruncatedInput`].
    pub fn next_chunk(&mut self) -> Result<Chunk<'a>, MooError> {
        let tag = ChunkTag(self.read_array()?);
        let length = self.read_u32()?;
        let payload_start = self.offset();
        let payload = self.split(length as usize)?;
        Ok(Chunk {
            header: ChunkHeader {
                tag,
                length,
                payload_start,
                payload_end: payload_start + length as usize,
            },
            payload,
        })
    }

    /// Iterate over sibling chunks until this cursor is exhausted. Trailing
    /// bytes too short to hold a chunk header are ignored.
    pub fn chunks(self) -> Chunks<'a> {
        Chunks {
            cursor: self,
            failed: false,
        }
    }
}

/// Iterator over consecutive sibling chunks; see [`Cursor::chunks`].
pub struct Chunks<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, MooError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_empty() {
            return None;
        }
        if self.cursor.remaining() < CHUNK_HEADER_LEN {
            log::trace!(
                "ignoring {} trailing bytes at offset {}",
                self.cursor.remaining(),
                self.cursor.offset()
            );
            return None;
        }
        let chunk = self.cursor.next_chunk();
        self.failed = chunk.is_err();
        Some(chunk)
    }
}
