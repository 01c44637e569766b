//! MOO CPU test vector parser.
//!
//! A MOO file holds a set of single-instruction tests for one x86-family
//! CPU: the processor state before and after the instruction, the
//! instruction bytes, and a bus trace of every clock it took. This crate
//! decodes such files into a [`TestCollection`]; it does not write them.
//!
//! # Format
//!
//! The file is a flat sequence of chunks, each a 4-byte ASCII tag, a `u32`
//! payload length and the payload. All integers are little-endian. The first
//! chunk must be `MOO ` (version, test count, CPU). `TEST` chunks follow,
//! each a `u32` index and then nested subchunks (`NAME`, `BYTS`, `INIT`,
//! `FINA`, `CYCL`, `EXCP`, `HASH`, ...).
//!
//! Readers always advance by the declared length, so unknown tags and
//! payloads longer than this crate expects are skipped rather than
//! rejected.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use format_moo::{Register, TestCollection};
//!
//! let data = std::fs::read("tests/89.MOO")?;
//! let moo = TestCollection::parse(&data)?;
//! for test in &moo {
//!     println!("{} -> ax={:?}", test.name, moo.final_value(test, Register::AX, true));
//! }
//! # Ok(())
//! # }
//! ```

mod chunk;
mod collection;
mod cpu;
mod cursor;
mod cycle;
mod error;
mod flags;
mod hash;
mod header;
mod registers;
mod revocation;
mod state;
mod test;

pub use chunk::{CHUNK_HEADER_LEN, Chunk, ChunkHeader, ChunkTag, Chunks};
pub use collection::{CollectionStats, TestCollection};
pub use cpu::{BusStatus, CpuFamily, CpuType, DataBusWidth, TState};
pub use cursor::Cursor;
pub use cycle::{Cycle, decode_cycles};
pub use error::{Anomaly, MooError};
pub use flags::{FLAG_BITS, Flag, FlagsDiff};
pub use hash::{ParseHashError, TestHash};
pub use header::{FileHeader, FileMetadata, FormatVersion};
pub use registers::{
    REGISTERS_16, REGISTERS_32, Register, RegisterMask, RegisterSet, RegisterWidth,
};
pub use revocation::RevocationSet;
pub use state::{CpuState, EffectiveAddress, RamEntry, SegmentRegister};
pub use test::{Exception, GeneratorMetadata, RegisterDiff, Test};

/// Options controlling how strictly [`TestCollection::parse_with`] treats
/// data-integrity problems.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail with [`MooError::DuplicateHash`] instead of recording an
    /// [`Anomaly`] when two tests share a hash.
    pub strict_hashes: bool,
}
