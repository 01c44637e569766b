//! CPU identity and the CPU-dependent interpretation of raw fields.
//!
//! Everything that varies by processor (register width, bus status
//! encoding, T-state naming) is a `match` over [`CpuFamily`], so adding a
//! CPU forces every table to be revisited.

use std::fmt;

use crate::error::MooError;
use crate::header::FormatVersion;
use crate::registers::RegisterWidth;

/// The processor a test file was captured from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CpuType {
    Intel8088,
    Intel8086,
    NecV20,
    NecV30,
    Intel80188,
    Intel80186,
    Intel80286,
    Harris80C286,
    Intel80386Ex,
}

/// Groups of CPUs that share bus and register conventions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CpuFamily {
    Intel8086,
    NecV30,
    Intel80186,
    Intel80286,
    Intel80386,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataBusWidth {
    Eight,
    Sixteen,
}

impl CpuType {
    pub const ALL: [CpuType; 9] = [
        CpuType::Intel8088,
        CpuType::Intel8086,
        CpuType::NecV20,
        CpuType::NecV30,
        CpuType::Intel80188,
        CpuType::Intel80186,
        CpuType::Intel80286,
        CpuType::Harris80C286,
        CpuType::Intel80386Ex,
    ];

    /// The 4-byte identifier stored in the file header.
    pub fn id(self) -> &'static [u8; 4] {
        match self {
            Self::Intel8088 => b"8088",
            Self::Intel8086 => b"8086",
            Self::NecV20 => b"V20 ",
            Self::NecV30 => b"V30 ",
            Self::Intel80188 => b"188 ",
            Self::Intel80186 => b"186 ",
            Self::Intel80286 => b"286 ",
            Self::Harris80C286 => b"C286",
            Self::Intel80386Ex => b"386E",
        }
    }

    /// Resolve a header identifier, rejecting CPUs the given version cannot name.
    pub fn from_id(id: [u8; 4], version: FormatVersion) -> Result<Self, MooError> {
        Self::ALL
            .into_iter()
            .find(|cpu| *cpu.id() == id)
            .filter(|cpu| cpu.introduced_in() <= version)
            .ok_or(MooError::UnsupportedCpu { id, version })
    }

    /// The first format version whose CPU identifier set includes this CPU.
    pub fn introduced_in(self) -> FormatVersion {
        match self {
            Self::Intel80188 | Self::Intel80186 | Self::Harris80C286 => FormatVersion::V1_1,
            _ => FormatVersion::V1_0,
        }
    }

    /// Resolve the numeric CPU code used by the `META` chunk.
    pub fn from_metadata_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Intel8088),
            1 => Some(Self::Intel8086),
            2 => Some(Self::NecV20),
            3 => Some(Self::NecV30),
            4 => Some(Self::Intel80188),
            5 => Some(Self::Intel80186),
            6 => Some(Self::Harris80C286),
            7 => Some(Self::Intel80386Ex),
            8 => Some(Self::Intel80286),
            _ => None,
        }
    }

    pub fn family(self) -> CpuFamily {
        match self {
            Self::Intel8088 | Self::Intel8086 => CpuFamily::Intel8086,
            Self::NecV20 | Self::NecV30 => CpuFamily::NecV30,
            Self::Intel80188 | Self::Intel80186 => CpuFamily::Intel80186,
            Self::Intel80286 | Self::Harris80C286 => CpuFamily::Intel80286,
            Self::Intel80386Ex => CpuFamily::Intel80386,
        }
    }

    pub fn register_width(self) -> RegisterWidth {
        match self.family() {
            CpuFamily::Intel80386 => RegisterWidth::ThirtyTwo,
            CpuFamily::Intel8086
            | CpuFamily::NecV30
            | CpuFamily::Intel80186
            | CpuFamily::Intel80286 => RegisterWidth::Sixteen,
        }
    }

    pub fn data_bus_width(self) -> DataBusWidth {
        match self {
            Self::Intel8088 | Self::NecV20 | Self::Intel80188 => DataBusWidth::Eight,
            _ => DataBusWidth::Sixteen,
        }
    }

    /// Name of the register at `bit` in this CPU's register table.
    pub fn register_name(self, bit: u32) -> Option<&'static str> {
        self.register_width().register_at(bit).map(|r| r.name())
    }

    /// Strip a raw bus status byte down to the bits this CPU drives.
    pub fn raw_bus_status(self, raw: u8) -> u8 {
        match self.family() {
            CpuFamily::Intel80286 => raw & 0x0F,
            CpuFamily::Intel8086
            | CpuFamily::NecV30
            | CpuFamily::Intel80186
            | CpuFamily::Intel80386 => raw & 0x07,
        }
    }

    pub fn decode_bus_status(self, raw: u8) -> BusStatus {
        let status = self.raw_bus_status(raw) as usize;
        match self.family() {
            CpuFamily::Intel80286 => BUS_STATUS_80286[status],
            CpuFamily::Intel80386 => BUS_STATUS_80386[status],
            CpuFamily::Intel8086 | CpuFamily::NecV30 | CpuFamily::Intel80186 => {
                BUS_STATUS_8086[status]
            }
        }
    }

    pub fn bus_status_name(self, raw: u8) -> &'static str {
        self.decode_bus_status(raw).name()
    }

    pub fn t_state_name(self, raw: u8) -> &'static str {
        let Some(state) = TState::from_raw(raw) else {
            return "T?";
        };
        match self.family() {
            CpuFamily::Intel80286 => match state {
                TState::Ti => "Ti",
                TState::T1 => "Ts",
                TState::T2 => "Tc",
                TState::Tw => "Tw",
                TState::T3 | TState::T4 => "T?",
            },
            CpuFamily::Intel8086
            | CpuFamily::NecV30
            | CpuFamily::Intel80186
            | CpuFamily::Intel80386 => state.name(),
        }
    }

    /// Queue status is only driven by the 8086-style bus interface units.
    pub fn queue_op_name(self, raw: u8) -> &'static str {
        match self.family() {
            CpuFamily::Intel8086 | CpuFamily::NecV30 | CpuFamily::Intel80186 => {
                QUEUE_OP_NAMES[(raw & 0x03) as usize]
            }
            CpuFamily::Intel80286 | CpuFamily::Intel80386 => "-",
        }
    }

    pub fn segment_status_name(self, raw: u8) -> &'static str {
        match self.family() {
            CpuFamily::Intel8086 | CpuFamily::NecV30 | CpuFamily::Intel80186 => {
                SEGMENT_STATUS_NAMES.get(raw as usize).copied().unwrap_or("--")
            }
            CpuFamily::Intel80286 | CpuFamily::Intel80386 => "--",
        }
    }
}

impl fmt::Display for CpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Intel8088 => "Intel 8088",
            Self::Intel8086 => "Intel 8086",
            Self::NecV20 => "NEC V20",
            Self::NecV30 => "NEC V30",
            Self::Intel80188 => "Intel 80188",
            Self::Intel80186 => "Intel 80186",
            Self::Intel80286 => "Intel 80286",
            Self::Harris80C286 => "Harris 80C286",
            Self::Intel80386Ex => "Intel 80386EX",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Bus status
// ---------------------------------------------------------------------------

/// Decoded bus cycle type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusStatus {
    /// Interrupt acknowledge.
    Inta,
    IoRead,
    IoWrite,
    Halt,
    CodeFetch,
    MemRead,
    MemWrite,
    /// No bus activity.
    Passive,
}

impl BusStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Inta => "INTA",
            Self::IoRead => "IOR",
            Self::IoWrite => "IOW",
            Self::Halt => "HALT",
            Self::CodeFetch => "CODE",
            Self::MemRead => "MEMR",
            Self::MemWrite => "MEMW",
            Self::Passive => "PASV",
        }
    }
}

use BusStatus::{CodeFetch, Halt, Inta, IoRead, IoWrite, MemRead, MemWrite, Passive};

/// S2..S0 on 8086, V30 and 80186 parts.
const BUS_STATUS_8086: [BusStatus; 8] =
    [Inta, IoRead, IoWrite, Halt, CodeFetch, MemRead, MemWrite, Passive];

/// COD/INTA, M/IO, S1, S0 on the 80286. Reserved encodings read as passive.
const BUS_STATUS_80286: [BusStatus; 16] = [
    Inta, Passive, Passive, Passive, Halt, MemRead, MemWrite, Passive, Passive, IoRead, IoWrite,
    Passive, Passive, CodeFetch, Passive, Passive,
];

const BUS_STATUS_80386: [BusStatus; 8] =
    [Inta, Passive, IoRead, IoWrite, CodeFetch, Halt, MemRead, MemWrite];

// ---------------------------------------------------------------------------
// T-states, queue and segment status
// ---------------------------------------------------------------------------

/// Bus cycle phase as recorded by the capture hardware.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TState {
    Ti,
    T1,
    T2,
    T3,
    T4,
    Tw,
}

impl TState {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw & 0x07 {
            0 => Some(Self::Ti),
            1 => Some(Self::T1),
            2 => Some(Self::T2),
            3 => Some(Self::T3),
            4 => Some(Self::T4),
            5 => Some(Self::Tw),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ti => "Ti",
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::T3 => "T3",
            Self::T4 => "T4",
            Self::Tw => "Tw",
        }
    }
}

/// QS1/QS0: no operation, first byte, queue flushed, subsequent byte.
const QUEUE_OP_NAMES: [&str; 4] = ["-", "F", "E", "S"];

/// S4/S3 segment status.
const SEGMENT_STATUS_NAMES: [&str; 4] = ["ES", "SS", "CS", "DS"];
