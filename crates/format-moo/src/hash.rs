//! 20-byte test content hash.

use std::fmt;
use std::str::FromStr;

/// Opaque content identity of a test, taken verbatim from its `HASH` chunk.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestHash(pub [u8; 20]);

impl TestHash {
    pub const LEN: usize = 20;

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for TestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestHash({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseHashError {
    /// Not exactly 40 characters.
    Length(usize),
    InvalidHex,
}

impl fmt::Display for ParseHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length(len) => write!(f, "expected 40 hex characters, got {len}"),
            Self::InvalidHex => f.write_str("invalid hex digit"),
        }
    }
}

impl std::error::Error for ParseHashError {}

impl FromStr for TestHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN * 2 {
            return Err(ParseHashError::Length(s.len()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(s, &mut out).map_err(|_| ParseHashError::InvalidHex)?;
        Ok(Self(out))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TestHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
