//! Decode errors and non-fatal anomalies.
//!
//! Structural problems (truncation, a missing file header, an unknown
//! version or CPU) abort the decode and surface as [`MooError`]. Problems
//! that leave the decoded data usable are recorded as [`Anomaly`] values on
//! whatever produced them and logged at `warn` level.

use std::fmt;

use crate::chunk::ChunkTag;
use crate::hash::TestHash;
use crate::header::FormatVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MooError {
    /// A read would run past the end of the buffer or of the enclosing chunk.
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// The first chunk is not a `MOO ` file header.
    InvalidContainer { found: ChunkTag },
    UnsupportedVersion { major: u8, minor: u8 },
    /// The CPU identifier is unknown, or not valid for the file's version.
    UnsupportedCpu { id: [u8; 4], version: FormatVersion },
    /// Two tests share a content hash. Only returned under
    /// [`DecodeOptions::strict_hashes`](crate::DecodeOptions).
    DuplicateHash {
        hash: TestHash,
        first: usize,
        second: usize,
    },
}

impl fmt::Display for MooError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedInput {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated MOO data at offset {offset}: need {needed} bytes, {available} remain"
            ),
            Self::InvalidContainer { found } => {
                write!(f, "not a MOO file: expected \"MOO \" header chunk, found {found:?}")
            }
            Self::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported MOO version {major}.{minor}")
            }
            Self::UnsupportedCpu { id, version } => write!(
                f,
                "unsupported CPU identifier {:?} for MOO version {version}",
                String::from_utf8_lossy(id)
            ),
            Self::DuplicateHash {
                hash,
                first,
                second,
            } => write!(f, "tests {first} and {second} share hash {hash}"),
        }
    }
}

impl std::error::Error for MooError {}

/// A condition worth reporting that does not invalidate the decoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// Two tests share a content hash; the index points at `second`.
    DuplicateHash {
        hash: TestHash,
        first: usize,
        second: usize,
    },
    /// A TEST chunk's stored index differs from its position in the file.
    TestIndexMismatch { expected: u32, found: u32 },
    /// A revocation list line that is not a 40-character hex hash.
    MalformedRevocationEntry { line: usize, text: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateHash {
                hash,
                first,
                second,
            } => write!(
                f,
                "duplicate test hash {hash}: test {second} replaces test {first} in the index"
            ),
            Self::TestIndexMismatch { expected, found } => {
                write!(f, "test index mismatch: expected {expected}, found {found}")
            }
            Self::MalformedRevocationEntry { line, text } => {
                write!(f, "skipping malformed revocation entry on line {line}: {text:?}")
            }
        }
    }
}
