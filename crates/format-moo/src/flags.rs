//! Named bits of the FLAGS/EFLAGS register.

use std::fmt;

/// A defined (non-reserved) bit of FLAGS or EFLAGS.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Flag {
    /// Carry.
    CF,
    /// Parity.
    PF,
    /// Auxiliary carry.
    AF,
    /// Zero.
    ZF,
    /// Sign.
    SF,
    /// Trap.
    TF,
    /// Interrupt enable.
    IF,
    /// Direction.
    DF,
    /// Overflow.
    OF,
    /// I/O privilege level, low bit.
    IOPL0,
    /// I/O privilege level, high bit.
    IOPL1,
    /// Nested task.
    NT,
    /// Resume (EFLAGS only).
    RF,
    /// Virtual-8086 mode (EFLAGS only).
    VM,
}

/// Flags indexed by bit position; `None` marks a reserved bit.
pub const FLAG_BITS: [Option<Flag>; 18] = [
    Some(Flag::CF),
    None,
    Some(Flag::PF),
    None,
    Some(Flag::AF),
    None,
    Some(Flag::ZF),
    Some(Flag::SF),
    Some(Flag::TF),
    Some(Flag::IF),
    Some(Flag::DF),
    Some(Flag::OF),
    Some(Flag::IOPL0),
    Some(Flag::IOPL1),
    Some(Flag::NT),
    None,
    Some(Flag::RF),
    Some(Flag::VM),
];

impl Flag {
    pub fn from_bit(bit: u32) -> Option<Self> {
        FLAG_BITS.get(bit as usize).copied().flatten()
    }

    pub fn bit(self) -> u32 {
        match self {
            Self::CF => 0,
            Self::PF => 2,
            Self::AF => 4,
            Self::ZF => 6,
            Self::SF => 7,
            Self::TF => 8,
            Self::IF => 9,
            Self::DF => 10,
            Self::OF => 11,
            Self::IOPL0 => 12,
            Self::IOPL1 => 13,
            Self::NT => 14,
            Self::RF => 16,
            Self::VM => 17,
        }
    }

    pub fn mask(self) -> u32 {
        1 << self.bit()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CF => "CF",
            Self::PF => "PF",
            Self::AF => "AF",
            Self::ZF => "ZF",
            Self::SF => "SF",
            Self::TF => "TF",
            Self::IF => "IF",
            Self::DF => "DF",
            Self::OF => "OF",
            Self::IOPL0 => "IOPL0",
            Self::IOPL1 => "IOPL1",
            Self::NT => "NT",
            Self::RF => "RF",
            Self::VM => "VM",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flags an instruction changed, split by direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FlagsDiff {
    pub set: Vec<Flag>,
    pub cleared: Vec<Flag>,
}

impl FlagsDiff {
    /// Compare two flags register values. Reserved bits are ignored.
    pub fn between(initial: u32, r#final: u32) -> Self {
        let changed = initial ^ r#final;
        let mut diff = Self::default();
        for flag in FLAG_BITS.iter().flatten() {
            if changed & flag.mask() == 0 {
                continue;
            }
            if r#final & flag.mask() != 0 {
                diff.set.push(*flag);
            } else {
                diff.cleared.push(*flag);
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.cleared.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_bit_positions() {
        for (bit, flag) in FLAG_BITS.iter().enumerate() {
            if let Some(flag) = flag {
                assert_eq!(flag.bit() as usize, bit, "{flag}");
            }
        }
        assert_eq!(Flag::from_bit(1), None);
        assert_eq!(Flag::from_bit(11), Some(Flag::OF));
        assert_eq!(Flag::from_bit(17), Some(Flag::VM));
        assert_eq!(Flag::from_bit(18), None);
    }

    #[test]
    fn diff_splits_set_and_cleared() {
        // CF and ZF set, SF cleared.
        let diff = FlagsDiff::between(0x0082, 0x0043);
        assert_eq!(diff.set, [Flag::CF, Flag::ZF]);
        assert_eq!(diff.cleared, [Flag::SF]);
    }

    #[test]
    fn unchanged_flags_give_empty_diff() {
        assert!(FlagsDiff::between(0xF202, 0xF202).is_empty());
        // Only reserved bits differ.
        assert!(FlagsDiff::between(0x0002, 0x8000).is_empty());
    }
}
