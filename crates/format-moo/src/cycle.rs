//! Bus cycle traces (`CYCL` chunks).
//!
//! # Format
//!
//! A `u32` count followed by fixed 15-byte records:
//!
//! | Offset | Size | Field            |
//! |--------|------|------------------|
//! | 0      | 1    | pin bitfield 0   |
//! | 1      | 4    | address latch    |
//! | 5      | 1    | segment status   |
//! | 6      | 1    | memory status    |
//! | 7      | 1    | I/O status       |
//! | 8      | 1    | pin bitfield 1   |
//! | 9      | 2    | data bus         |
//! | 11     | 1    | bus status       |
//! | 12     | 1    | T-state          |
//! | 13     | 1    | queue op status  |
//! | 14     | 1    | queue byte read  |
//!
//! Raw values are kept as-is; naming them needs the CPU type (see
//! [`CpuType`]).

use crate::cpu::{BusStatus, CpuType, DataBusWidth, TState};
use crate::cursor::Cursor;
use crate::error::MooError;

/// One bus clock of captured CPU activity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Cycle {
    pub pins0: u8,
    pub address_latch: u32,
    pub segment_status: u8,
    pub memory_status: u8,
    pub io_status: u8,
    pub pins1: u8,
    pub data_bus: u16,
    pub bus_status: u8,
    pub t_state: u8,
    pub queue_op: u8,
    pub queue_byte: u8,
}

impl Cycle {
    /// Encoded size of one record.
    pub const LEN: usize = 15;

    pub const PIN_ALE: u8 = 0b0000_0001;
    /// BHE on CPUs with a 16-bit data bus.
    pub const PIN_BHE: u8 = 0b0000_0010;
    pub const PIN_READY: u8 = 0b0000_0100;
    pub const PIN_LOCK: u8 = 0b0000_1000;
    /// BHE position in `pins1` on CPUs with an 8-bit data bus.
    pub const PIN1_BHE: u8 = 0b0000_0001;

    pub const MEM_READ: u8 = 0b0000_0100;
    pub const MEM_ADVANCED_WRITE: u8 = 0b0000_0010;
    pub const MEM_WRITE: u8 = 0b0000_0001;
    pub const IO_READ: u8 = 0b0000_0100;
    pub const IO_ADVANCED_WRITE: u8 = 0b0000_0010;
    pub const IO_WRITE: u8 = 0b0000_0001;

    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, MooError> {
        Ok(Self {
            pins0: cursor.read_u8()?,
            address_latch: cursor.read_u32()?,
            segment_status: cursor.read_u8()?,
            memory_status: cursor.read_u8()?,
            io_status: cursor.read_u8()?,
            pins1: cursor.read_u8()?,
            data_bus: cursor.read_u16()?,
            bus_status: cursor.read_u8()?,
            t_state: cursor.read_u8()?,
            queue_op: cursor.read_u8()?,
            queue_byte: cursor.read_u8()?,
        })
    }

    pub fn ale(&self) -> bool {
        self.pins0 & Self::PIN_ALE != 0
    }

    pub fn ready(&self) -> bool {
        self.pins0 & Self::PIN_READY != 0
    }

    pub fn lock(&self) -> bool {
        self.pins0 & Self::PIN_LOCK != 0
    }

    /// Level of the BHE pin, read from whichever bitfield `cpu` records it in.
    pub fn bhe_pin(&self, cpu: CpuType) -> bool {
        match cpu.data_bus_width() {
            DataBusWidth::Sixteen => self.pins0 & Self::PIN_BHE != 0,
            DataBusWidth::Eight => self.pins1 & Self::PIN1_BHE != 0,
        }
    }

    pub fn is_reading_mem(&self) -> bool {
        self.memory_status & Self::MEM_READ != 0
    }

    pub fn is_writing_mem(&self) -> bool {
        self.memory_status & Self::MEM_WRITE != 0
    }

    /// Advanced write command, asserted a clock ahead of the normal one.
    pub fn is_advanced_writing_mem(&self) -> bool {
        self.memory_status & Self::MEM_ADVANCED_WRITE != 0
    }

    pub fn is_reading_io(&self) -> bool {
        self.io_status & Self::IO_READ != 0
    }

    pub fn is_writing_io(&self) -> bool {
        self.io_status & Self::IO_WRITE != 0
    }

    pub fn is_advanced_writing_io(&self) -> bool {
        self.io_status & Self::IO_ADVANCED_WRITE != 0
    }

    pub fn bus_state(&self, cpu: CpuType) -> BusStatus {
        cpu.decode_bus_status(self.bus_status)
    }

    pub fn is_code_fetch(&self, cpu: CpuType) -> bool {
        self.is_reading_mem() && self.bus_state(cpu) == BusStatus::CodeFetch
    }

    pub fn t_state(&self) -> Option<TState> {
        TState::from_raw(self.t_state)
    }
}

/// Decode a `CYCL` payload. Records stay in file (execution) order.
pub fn decode_cycles(cursor: &mut Cursor<'_>) -> Result<Vec<Cycle>, MooError> {
    let count = cursor.read_u32()? as usize;
    let mut cycles = Vec::with_capacity(count.min(cursor.remaining() / Cycle::LEN));
    for _ in 0..count {
        cycles.push(Cycle::decode(cursor)?);
    }
    Ok(cycles)
}
