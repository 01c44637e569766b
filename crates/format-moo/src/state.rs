//! CPU snapshots: the payload of `INIT` and `FINA` chunks.
//!
//! A state is a sequence of subchunks (`REGS`/`RG32`, `RMSK`/`RM32`,
//! `RAM `, `QUEU`, `EA32`) in any order, any of which may be absent.
//! Unrecognised subchunks are skipped.

use crate::chunk::ChunkTag;
use crate::cursor::Cursor;
use crate::error::MooError;
use crate::header::FileHeader;
use crate::registers::{RegisterMask, RegisterSet, RegisterWidth};

/// One byte of memory at a physical address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RamEntry {
    pub address: u32,
    pub value: u8,
}

/// Segment register numbering used by the `EA32` chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SegmentRegister {
    CS,
    SS,
    DS,
    ES,
    FS,
    GS,
}

impl SegmentRegister {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw & 0x07 {
            0 => Some(Self::CS),
            1 => Some(Self::SS),
            2 => Some(Self::DS),
            3 => Some(Self::ES),
            4 => Some(Self::FS),
            5 => Some(Self::GS),
            _ => None,
        }
    }
}

/// Effective address calculation for an instruction with a memory operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EffectiveAddress {
    /// Raw segment register number; see [`EffectiveAddress::segment`].
    pub base_segment: u8,
    pub base_selector: u16,
    pub base_address: u32,
    pub base_limit: u32,
    pub offset: u32,
    pub linear_address: u32,
    pub physical_address: u32,
}

impl EffectiveAddress {
    /// Encoded size of an `EA32` payload.
    pub const LEN: usize = 23;

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, MooError> {
        Ok(Self {
            base_segment: cursor.read_u8()?,
            base_selector: cursor.read_u16()?,
            base_address: cursor.read_u32()?,
            base_limit: cursor.read_u32()?,
            offset: cursor.read_u32()?,
            linear_address: cursor.read_u32()?,
            physical_address: cursor.read_u32()?,
        })
    }

    pub fn segment(&self) -> Option<SegmentRegister> {
        SegmentRegister::from_raw(self.base_segment)
    }
}

/// A pre- or post-execution CPU snapshot.
///
/// In a final state, `registers` only holds registers the instruction
/// changed. Use [`Test::final_value`](crate::Test::final_value) to resolve
/// the others against the initial state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CpuState {
    pub registers: RegisterSet,
    pub masks: Option<RegisterMask>,
    pub ram: Vec<RamEntry>,
    pub queue: Option<Vec<u8>>,
    pub effective_address: Option<EffectiveAddress>,
}

impl CpuState {
    pub fn empty(width: RegisterWidth) -> Self {
        Self {
            registers: RegisterSet::empty(width),
            masks: None,
            ram: Vec::new(),
            queue: None,
            effective_address: None,
        }
    }

    /// Decode a state payload. The loop ends at the payload's end, not after
    /// a fixed set of subchunks.
    pub fn decode(payload: Cursor<'_>, header: &FileHeader) -> Result<Self, MooError> {
        let mut state = Self::empty(header.register_width());

        for chunk in payload.chunks() {
            let mut chunk = chunk?;
            let p = &mut chunk.payload;
            match chunk.header.tag {
                ChunkTag::REGISTERS_16 => {
                    state.registers = RegisterSet::decode(p, RegisterWidth::Sixteen)?;
                }
                ChunkTag::REGISTERS_32 => {
                    state.registers = RegisterSet::decode(p, RegisterWidth::ThirtyTwo)?;
                }
                ChunkTag::MASKS_16 if header.version.has_register_masks() => {
                    state.masks = Some(RegisterMask::decode(p, RegisterWidth::Sixteen)?);
                }
                ChunkTag::MASKS_32 if header.version.has_register_masks() => {
                    state.masks = Some(RegisterMask::decode(p, RegisterWidth::ThirtyTwo)?);
                }
                ChunkTag::RAM => state.ram = decode_ram(p)?,
                ChunkTag::QUEUE => state.queue = Some(decode_queue(p)?),
                ChunkTag::EFFECTIVE_ADDRESS_32 if header.version.has_effective_address() => {
                    state.effective_address = Some(EffectiveAddress::decode(p)?);
                }
                tag => {
                    log::trace!(
                        "skipping {tag} chunk in CPU state at offset {}",
                        chunk.header.payload_start
                    );
                }
            }
        }

        Ok(state)
    }

    /// Value at `address` in this snapshot's RAM list.
    pub fn ram_at(&self, address: u32) -> Option<u8> {
        self.ram
            .iter()
            .find(|e| e.address == address)
            .map(|e| e.value)
    }
}

/// `QUEU`: a length-prefixed byte list. A zero-length chunk is an empty queue.
fn decode_queue(cursor: &mut Cursor<'_>) -> Result<Vec<u8>, MooError> {
    if cursor.is_empty() {
        return Ok(Vec::new());
    }
    Ok(cursor.read_prefixed_bytes()?.to_vec())
}

/// `RAM `: a `u32` count followed by `(u32 address, u8 value)` pairs.
fn decode_ram(cursor: &mut Cursor<'_>) -> Result<Vec<RamEntry>, MooError> {
    let count = cursor.read_u32()? as usize;
    // Each entry is 5 bytes; don't trust the count for preallocation.
    let mut entries = Vec::with_capacity(count.min(cursor.remaining() / 5));
    for _ in 0..count {
        entries.push(RamEntry {
            address: cursor.read_u32()?,
            value: cursor.read_u8()?,
        });
    }
    Ok(entries)
}
