//! The mandatory `MOO ` file header chunk and the optional `META` chunk.

use std::fmt;

use crate::chunk::ChunkTag;
use crate::cpu::CpuType;
use crate::cursor::Cursor;
use crate::error::MooError;
use crate::registers::RegisterWidth;

/// Format version. Ordered, so `a <= b` means "a is no newer than b".
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
}

impl FormatVersion {
    pub const V1_0: Self = Self { major: 1, minor: 0 };
    pub const V1_1: Self = Self { major: 1, minor: 1 };

    /// Undefined-bit mask chunks (`RMSK`/`RM32`) first appear in 1.1.
    pub fn has_register_masks(self) -> bool {
        self >= Self::V1_1
    }

    /// The `EA32` effective address chunk first appears in 1.1.
    pub fn has_effective_address(self) -> bool {
        self >= Self::V1_1
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Decoded `MOO ` chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileHeader {
    pub version: FormatVersion,
    pub test_count: u32,
    pub cpu: CpuType,
}

/// Minimum `MOO ` payload: version bytes, test count, CPU identifier.
const FILE_HEADER_LEN: usize = 12;

impl FileHeader {
    /// Read the first chunk of a file and resolve the version and CPU.
    ///
    /// Leaves `cursor` at the first chunk after the header, regardless of
    /// any trailing header fields a newer writer may have added.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, MooError> {
        let mut chunk = cursor.next_chunk()?;
        if chunk.tag() != ChunkTag::FILE_HEADER {
            return Err(MooError::InvalidContainer { found: chunk.tag() });
        }
        let p = &mut chunk.payload;
        if p.remaining() < FILE_HEADER_LEN {
            return Err(MooError::TruncatedInput {
                offset: p.offset(),
                needed: FILE_HEADER_LEN,
                available: p.remaining(),
            });
        }

        let major = p.read_u8()?;
        let minor = p.read_u8()?;
        let version = match (major, minor) {
            // 1.0: version byte + 3 reserved bytes. The first reserved byte
            // sits where 1.1 keeps its minor version, so it must be zero;
            // any other value reads as an unknown 1.x revision and is
            // rejected rather than guessed at. The other two are ignored.
            (1, 0) => {
                p.skip(2)?;
                FormatVersion::V1_0
            }
            // 1.1: major + minor + 2 reserved bytes.
            (1, 1) => {
                p.skip(2)?;
                FormatVersion::V1_1
            }
            (major, minor) => return Err(MooError::UnsupportedVersion { major, minor }),
        };

        let test_count = p.read_u32()?;
        let cpu = CpuType::from_id(p.read_array()?, version)?;

        log::debug!(
            "MOO header: version {version}, cpu {cpu}, {test_count} tests, {} byte payload",
            chunk.header.length
        );

        Ok(Self {
            version,
            test_count,
            cpu,
        })
    }

    pub fn register_width(&self) -> RegisterWidth {
        self.cpu.register_width()
    }
}

/// Decoded `META` chunk describing how a test set was produced.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileMetadata {
    pub set_version_major: u8,
    pub set_version_minor: u8,
    /// Raw CPU code; see [`FileMetadata::cpu`].
    pub cpu_code: u8,
    pub opcode: u32,
    pub mnemonic: [u8; 8],
    pub test_count: u32,
    pub file_seed: u64,
    pub flag_mask: u32,
}

impl FileMetadata {
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, MooError> {
        Ok(Self {
            set_version_major: cursor.read_u8()?,
            set_version_minor: cursor.read_u8()?,
            cpu_code: cursor.read_u8()?,
            opcode: cursor.read_u32()?,
            mnemonic: cursor.read_array()?,
            test_count: cursor.read_u32()?,
            file_seed: cursor.read_u64()?,
            flag_mask: cursor.read_u32()?,
        })
    }

    pub fn cpu(&self) -> Option<CpuType> {
        CpuType::from_metadata_code(self.cpu_code)
    }

    /// Mnemonic with its space padding removed.
    pub fn mnemonic(&self) -> String {
        String::from_utf8_lossy(&self.mnemonic).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_chunk(payload: &[u8]) -> Vec<u8> {
        let mut out = b"MOO ".to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn payload(major: u8, minor: u8, count: u32, cpu: &[u8; 4]) -> Vec<u8> {
        let mut p = vec![major, minor, 0, 0];
        p.extend_from_slice(&count.to_le_bytes());
        p.extend_from_slice(cpu);
        p
    }

    #[test]
    fn decode_v1_1() {
        let data = header_chunk(&payload(1, 1, 5000, b"C286"));
        let mut c = Cursor::new(&data);
        let header = FileHeader::decode(&mut c).expect("header");
        assert_eq!(header.version, FormatVersion::V1_1);
        assert_eq!(header.test_count, 5000);
        assert_eq!(header.cpu, CpuType::Harris80C286);
        assert!(c.is_empty());
    }

    #[test]
    fn decode_v1_0() {
        let data = header_chunk(&payload(1, 0, 1, b"8088"));
        let header = FileHeader::decode(&mut Cursor::new(&data)).expect("header");
        assert_eq!(header.version, FormatVersion::V1_0);
        assert_eq!(header.cpu, CpuType::Intel8088);
    }

    #[test]
    fn trailing_header_bytes_ignored() {
        let mut p = payload(1, 1, 2, b"386E");
        p.extend_from_slice(&[0xEE; 6]);
        let mut data = header_chunk(&p);
        data.extend_from_slice(b"NEXT");
        let mut c = Cursor::new(&data);
        let header = FileHeader::decode(&mut c).expect("header");
        assert_eq!(header.register_width(), RegisterWidth::ThirtyTwo);
        assert_eq!(c.read_bytes(4).expect("next tag"), b"NEXT");
    }

    #[test]
    fn wrong_first_chunk() {
        let mut data = b"TEST".to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(
            FileHeader::decode(&mut Cursor::new(&data)),
            Err(MooError::InvalidContainer {
                found: ChunkTag::TEST
            })
        );
    }

    #[test]
    fn unsupported_versions() {
        for (major, minor) in [(2, 0), (1, 2), (0, 0)] {
            let data = header_chunk(&payload(major, minor, 1, b"8086"));
            assert_eq!(
                FileHeader::decode(&mut Cursor::new(&data)),
                Err(MooError::UnsupportedVersion { major, minor })
            );
        }
    }

    #[test]
    fn v1_0_reserved_bytes() {
        let mut p = payload(1, 0, 3, b"8088");
        p[2..4].copy_from_slice(&[0xAA, 0x55]);
        let header = FileHeader::decode(&mut Cursor::new(&header_chunk(&p))).expect("header");
        assert_eq!(header.version, FormatVersion::V1_0);
        assert_eq!(header.test_count, 3);

        // Byte 1 is the minor version as far as the reader can tell.
        let data = header_chunk(&payload(1, 7, 3, b"8088"));
        assert_eq!(
            FileHeader::decode(&mut Cursor::new(&data)),
            Err(MooError::UnsupportedVersion { major: 1, minor: 7 })
        );
    }

    #[test]
    fn v1_1_cpu_in_v1_0_file() {
        let data = header_chunk(&payload(1, 0, 1, b"186 "));
        assert!(matches!(
            FileHeader::decode(&mut Cursor::new(&data)),
            Err(MooError::UnsupportedCpu { .. })
        ));
    }

    #[test]
    fn short_header_payload() {
        let data = header_chunk(&[1, 1, 0, 0, 1, 0]);
        assert!(matches!(
            FileHeader::decode(&mut Cursor::new(&data)),
            Err(MooError::TruncatedInput { needed: 12, .. })
        ));
    }

    #[test]
    fn metadata_fields() {
        let mut p = vec![1, 2, 7];
        p.extend_from_slice(&0x0F01u32.to_le_bytes());
        p.extend_from_slice(b"LAR     ");
        p.extend_from_slice(&10_000u32.to_le_bytes());
        p.extend_from_slice(&0xDEAD_BEEF_0000_0001u64.to_le_bytes());
        p.extend_from_slice(&0x0000_08D5u32.to_le_bytes());
        let meta = FileMetadata::decode(&mut Cursor::new(&p)).expect("meta");
        assert_eq!(meta.cpu(), Some(CpuType::Intel80386Ex));
        assert_eq!(meta.opcode, 0x0F01);
        assert_eq!(meta.mnemonic(), "LAR");
        assert_eq!(meta.file_seed, 0xDEAD_BEEF_0000_0001);
        assert_eq!(meta.flag_mask, 0x08D5);
    }
}
