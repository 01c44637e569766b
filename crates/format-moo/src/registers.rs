//! Bitmask-selected register files (`REGS`, `RG32`) and undefined-bit
//! masks (`RMSK`, `RM32`).
//!
//! # Encoding
//!
//! A bitmask (`u16` for 16-bit register files, `u32` for 32-bit) is
//! followed by one value of the same width per set bit, scanning from bit
//! 0 upwards. Bit positions index a fixed register table per width.

use std::fmt;

use crate::cursor::Cursor;
use crate::error::MooError;

/// Every register a MOO file can name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Register {
    AX,
    BX,
    CX,
    DX,
    CS,
    SS,
    DS,
    ES,
    FS,
    GS,
    SP,
    BP,
    SI,
    DI,
    IP,
    FLAGS,
    CR0,
    CR3,
    EAX,
    EBX,
    ECX,
    EDX,
    ESI,
    EDI,
    EBP,
    ESP,
    EIP,
    EFLAGS,
    DR6,
    DR7,
}

impl Register {
    pub fn name(self) -> &'static str {
        match self {
            Self::AX => "ax",
            Self::BX => "bx",
            Self::CX => "cx",
            Self::DX => "dx",
            Self::CS => "cs",
            Self::SS => "ss",
            Self::DS => "ds",
            Self::ES => "es",
            Self::FS => "fs",
            Self::GS => "gs",
            Self::SP => "sp",
            Self::BP => "bp",
            Self::SI => "si",
            Self::DI => "di",
            Self::IP => "ip",
            Self::FLAGS => "flags",
            Self::CR0 => "cr0",
            Self::CR3 => "cr3",
            Self::EAX => "eax",
            Self::EBX => "ebx",
            Self::ECX => "ecx",
            Self::EDX => "edx",
            Self::ESI => "esi",
            Self::EDI => "edi",
            Self::EBP => "ebp",
            Self::ESP => "esp",
            Self::EIP => "eip",
            Self::EFLAGS => "eflags",
            Self::DR6 => "dr6",
            Self::DR7 => "dr7",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit order of a `REGS`/`RMSK` chunk.
pub const REGISTERS_16: [Register; 14] = [
    Register::AX,
    Register::BX,
    Register::CX,
    Register::DX,
    Register::CS,
    Register::SS,
    Register::DS,
    Register::ES,
    Register::SP,
    Register::BP,
    Register::SI,
    Register::DI,
    Register::IP,
    Register::FLAGS,
];

/// Bit order of a `RG32`/`RM32` chunk.
pub const REGISTERS_32: [Register; 20] = [
    Register::CR0,
    Register::CR3,
    Register::EAX,
    Register::EBX,
    Register::ECX,
    Register::EDX,
    Register::ESI,
    Register::EDI,
    Register::EBP,
    Register::ESP,
    Register::CS,
    Register::DS,
    Register::ES,
    Register::FS,
    Register::GS,
    Register::SS,
    Register::EIP,
    Register::EFLAGS,
    Register::DR6,
    Register::DR7,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RegisterWidth {
    Sixteen,
    ThirtyTwo,
}

impl RegisterWidth {
    /// Number of bits in the bitmask, and so the highest possible value count.
    pub fn bits(self) -> u32 {
        match self {
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32,
        }
    }

    pub fn table(self) -> &'static [Register] {
        match self {
            Self::Sixteen => &REGISTERS_16,
            Self::ThirtyTwo => &REGISTERS_32,
        }
    }

    pub fn register_at(self, bit: u32) -> Option<Register> {
        self.table().get(bit as usize).copied()
    }

    pub fn bit_of(self, reg: Register) -> Option<u32> {
        self.table().iter().position(|&r| r == reg).map(|i| i as u32)
    }

    /// Bitmask with every named register present.
    pub fn full_mask(self) -> u32 {
        (1u32 << self.table().len()) - 1
    }
}

// ---------------------------------------------------------------------------
// Register sets
// ---------------------------------------------------------------------------

/// A sparse register file: only registers whose bit is set carry a value.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterSet {
    width: RegisterWidth,
    bitmask: u32,
    /// Indexed by bit position; slots for clear bits are always zero.
    values: [u32; 32],
}

impl RegisterSet {
    pub fn empty(width: RegisterWidth) -> Self {
        Self {
            width,
            bitmask: 0,
            values: [0; 32],
        }
    }

    /// Decode a bitmask followed by one value per set bit.
    pub fn decode(cursor: &mut Cursor<'_>, width: RegisterWidth) -> Result<Self, MooError> {
        let bitmask = match width {
            RegisterWidth::Sixteen => u32::from(cursor.read_u16()?),
            RegisterWidth::ThirtyTwo => cursor.read_u32()?,
        };
        let mut values = [0u32; 32];
        for bit in 0..width.bits() {
            if bitmask & (1 << bit) != 0 {
                values[bit as usize] = match width {
                    RegisterWidth::Sixteen => u32::from(cursor.read_u16()?),
                    RegisterWidth::ThirtyTwo => cursor.read_u32()?,
                };
            }
        }
        Ok(Self {
            width,
            bitmask,
            values,
        })
    }

    /// Build a set from `(register, value)` pairs; registers outside the
    /// width's table are ignored.
    pub fn from_values(width: RegisterWidth, pairs: &[(Register, u32)]) -> Self {
        let mut set = Self::empty(width);
        for &(reg, value) in pairs {
            if let Some(bit) = width.bit_of(reg) {
                set.bitmask |= 1 << bit;
                set.values[bit as usize] = value;
            }
        }
        set
    }

    pub fn width(&self) -> RegisterWidth {
        self.width
    }

    pub fn bitmask(&self) -> u32 {
        self.bitmask
    }

    /// Number of values present (the population count of the bitmask).
    pub fn len(&self) -> usize {
        self.bitmask.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bitmask == 0
    }

    /// True if every register in the width's table is present.
    pub fn is_complete(&self) -> bool {
        let full = self.width.full_mask();
        self.bitmask & full == full
    }

    pub fn get(&self, reg: Register) -> Option<u32> {
        self.width.bit_of(reg).and_then(|bit| self.get_bit(bit))
    }

    pub fn get_bit(&self, bit: u32) -> Option<u32> {
        (bit < 32 && self.bitmask & (1 << bit) != 0).then(|| self.values[bit as usize])
    }

    pub fn contains(&self, reg: Register) -> bool {
        self.get(reg).is_some()
    }

    /// Present values in bit order, including bits without a table entry.
    pub fn raw_values(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.width.bits()).filter_map(|bit| self.get_bit(bit).map(|v| (bit, v)))
    }

    /// Present named registers in bit order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, u32)> + '_ {
        self.raw_values()
            .filter_map(|(bit, v)| self.width.register_at(bit).map(|r| (r, v)))
    }
}

impl fmt::Debug for RegisterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (bit, value) in self.raw_values() {
            match self.width.register_at(bit) {
                Some(reg) => map.entry(&reg.name(), &format_args!("{value:#06X}")),
                None => map.entry(&bit, &format_args!("{value:#06X}")),
            };
        }
        map.finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RegisterSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (reg, value) in self.iter() {
            map.serialize_entry(reg.name(), &value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Undefined-bit masks
// ---------------------------------------------------------------------------

/// Per-register masks of defined bits. A final value is compared as
/// `value & mask`; registers without an entry are compared in full.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct RegisterMask(RegisterSet);

impl RegisterMask {
    pub fn decode(cursor: &mut Cursor<'_>, width: RegisterWidth) -> Result<Self, MooError> {
        RegisterSet::decode(cursor, width).map(Self)
    }

    pub fn from_set(set: RegisterSet) -> Self {
        Self(set)
    }

    pub fn as_set(&self) -> &RegisterSet {
        &self.0
    }

    pub fn mask_for(&self, reg: Register) -> Option<u32> {
        self.0.get(reg)
    }

    /// Apply the mask for `reg` to `value`, or return `value` unchanged.
    pub fn apply(&self, reg: Register, value: u32) -> u32 {
        self.mask_for(reg).map_or(value, |mask| value & mask)
    }
}
