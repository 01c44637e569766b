//! Individual test records (`TEST` chunks).

use crate::chunk::{Chunk, ChunkTag};
use crate::cycle::{Cycle, decode_cycles};
use crate::error::MooError;
use crate::flags::FlagsDiff;
use crate::hash::TestHash;
use crate::header::FileHeader;
use crate::registers::{Register, RegisterMask, RegisterWidth};
use crate::state::CpuState;

/// `EXCP`: an exception raised while executing the test instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Exception {
    pub number: u8,
    /// Stack address where the CPU pushed the flags register.
    pub stack_flags_address: u32,
}

/// `GMET`: generator bookkeeping for a single test.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GeneratorMetadata {
    pub seed: u64,
    pub gen_count: u16,
}

/// A register whose resolved final value differs from its initial value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterDiff {
    pub register: Register,
    pub initial: u32,
    pub r#final: u32,
}

/// One decoded test vector.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Test {
    pub index: u32,
    pub name: String,
    pub bytes: Vec<u8>,
    pub initial: CpuState,
    pub r#final: CpuState,
    pub cycles: Vec<Cycle>,
    pub exception: Option<Exception>,
    pub hash: Option<TestHash>,
    pub gen_metadata: Option<GeneratorMetadata>,
}

impl Test {
    /// Decode a `TEST` chunk: a `u32` index, then subchunks to the end of
    /// the payload.
    pub fn decode(chunk: Chunk<'_>, header: &FileHeader) -> Result<Self, MooError> {
        let mut payload = chunk.payload;
        let index = payload.read_u32()?;

        let width = header.register_width();
        let mut test = Self {
            index,
            name: String::new(),
            bytes: Vec::new(),
            initial: CpuState::empty(width),
            r#final: CpuState::empty(width),
            cycles: Vec::new(),
            exception: None,
            hash: None,
            gen_metadata: None,
        };

        for sub in payload.chunks() {
            let mut sub = sub?;
            let p = &mut sub.payload;
            match sub.header.tag {
                ChunkTag::NAME => {
                    test.name = String::from_utf8_lossy(p.read_prefixed_bytes()?).into_owned();
                }
                ChunkTag::BYTES => test.bytes = p.read_prefixed_bytes()?.to_vec(),
                ChunkTag::INITIAL_STATE => test.initial = CpuState::decode(p.clone(), header)?,
                ChunkTag::FINAL_STATE => test.r#final = CpuState::decode(p.clone(), header)?,
                ChunkTag::CYCLES => test.cycles = decode_cycles(p)?,
                ChunkTag::EXCEPTION => {
                    test.exception = Some(Exception {
                        number: p.read_u8()?,
                        stack_flags_address: p.read_u32()?,
                    });
                }
                ChunkTag::HASH => test.hash = Some(TestHash(p.read_array()?)),
                ChunkTag::GENERATOR_METADATA => {
                    test.gen_metadata = Some(GeneratorMetadata {
                        seed: p.read_u64()?,
                        gen_count: p.read_u16()?,
                    });
                }
                tag => log::trace!("skipping {tag} chunk in test {index}"),
            }
        }

        Ok(test)
    }

    pub fn initial_value(&self, reg: Register) -> Option<u32> {
        self.initial.registers.get(reg)
    }

    /// Final value of `reg`, falling back to the initial value when the
    /// instruction left it unchanged.
    pub fn final_value(&self, reg: Register) -> Option<u32> {
        self.r#final
            .registers
            .get(reg)
            .or_else(|| self.initial_value(reg))
    }

    /// The mask governing this test: its own final-state mask if present,
    /// otherwise `file_mask`.
    pub fn governing_mask<'a>(
        &'a self,
        file_mask: Option<&'a RegisterMask>,
    ) -> Option<&'a RegisterMask> {
        self.r#final.masks.as_ref().or(file_mask)
    }

    /// Final value of `reg` with the governing undefined-bit mask applied.
    pub fn final_value_masked(
        &self,
        reg: Register,
        file_mask: Option<&RegisterMask>,
    ) -> Option<u32> {
        let value = self.final_value(reg)?;
        Some(match self.governing_mask(file_mask) {
            Some(mask) => mask.apply(reg, value),
            None => value,
        })
    }

    /// Registers whose resolved final value differs from the initial value.
    pub fn register_diff(&self) -> Vec<RegisterDiff> {
        self.r#final
            .registers
            .iter()
            .filter_map(|(register, r#final)| {
                let initial = self.initial_value(register)?;
                (initial != r#final).then_some(RegisterDiff {
                    register,
                    initial,
                    r#final,
                })
            })
            .collect()
    }

    /// Flags the instruction set or cleared. Empty when the final state
    /// carries no flags register.
    pub fn flags_diff(&self) -> FlagsDiff {
        let reg = match self.initial.registers.width() {
            RegisterWidth::Sixteen => Register::FLAGS,
            RegisterWidth::ThirtyTwo => Register::EFLAGS,
        };
        match (self.initial_value(reg), self.r#final.registers.get(reg)) {
            (Some(initial), Some(r#final)) => FlagsDiff::between(initial, r#final),
            _ => FlagsDiff::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuType;
    use crate::cursor::Cursor;
    use crate::header::FormatVersion;
    use crate::flags::Flag;
    use crate::registers::RegisterSet;

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn prefixed(bytes: &[u8]) -> Vec<u8> {
        let mut out = (bytes.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(bytes);
        out
    }

    fn header() -> FileHeader {
        FileHeader {
            version: FormatVersion::V1_1,
            test_count: 1,
            cpu: CpuType::Intel8086,
        }
    }

    fn decode(body: &[u8]) -> Result<Test, MooError> {
        let data = chunk(b"TEST", body);
        let mut c = Cursor::new(&data);
        let chunk = c.next_chunk()?;
        Test::decode(chunk, &header())
    }

    #[test]
    fn decodes_subchunks() {
        let mut body = 7u32.to_le_bytes().to_vec();
        body.extend(chunk(b"NAME", &prefixed(b"nop")));
        body.extend(chunk(b"BYTS", &prefixed(&[0x90])));
        body.extend(chunk(b"INIT", &chunk(b"REGS", &[0x01, 0x00, 0x01, 0x00])));
        body.extend(chunk(b"FINA", &chunk(b"REGS", &[0x00, 0x00])));
        body.extend(chunk(b"CYCL", &0u32.to_le_bytes()));
        body.extend(chunk(b"EXCP", &[0x06, 0x00, 0x10, 0x00, 0x00]));
        body.extend(chunk(b"GMET", &[1, 0, 0, 0, 0, 0, 0, 0, 3, 0]));
        body.extend(chunk(b"HASH", &[0xAB; 20]));

        let test = decode(&body).expect("test");
        assert_eq!(test.index, 7);
        assert_eq!(test.name, "nop");
        assert_eq!(test.bytes, [0x90]);
        assert_eq!(test.initial_value(Register::AX), Some(1));
        assert_eq!(test.final_value(Register::AX), Some(1));
        assert!(test.cycles.is_empty());
        assert_eq!(
            test.exception,
            Some(Exception {
                number: 6,
                stack_flags_address: 0x1000
            })
        );
        assert_eq!(
            test.gen_metadata,
            Some(GeneratorMetadata {
                seed: 1,
                gen_count: 3
            })
        );
        assert_eq!(test.hash, Some(TestHash([0xAB; 20])));
    }

    #[test]
    fn missing_optional_chunks() {
        let body = 0u32.to_le_bytes();
        let test = decode(&body).expect("bare test");
        assert!(test.name.is_empty());
        assert!(test.hash.is_none());
        assert!(test.exception.is_none());
        assert_eq!(test.initial.registers.width(), RegisterWidth::Sixteen);
    }

    #[test]
    fn unknown_subchunk_skipped() {
        let mut body = 0u32.to_le_bytes().to_vec();
        body.extend(chunk(b"XTRA", &[0xFF; 9]));
        body.extend(chunk(b"NAME", &prefixed(b"after")));
        assert_eq!(decode(&body).expect("test").name, "after");
    }

    #[test]
    fn longer_exception_chunk_tolerated() {
        let mut body = 0u32.to_le_bytes().to_vec();
        body.extend(chunk(b"EXCP", &[0x0D, 0x44, 0x33, 0x22, 0x11, 0xEE, 0xEE]));
        body.extend(chunk(b"NAME", &prefixed(b"gp")));
        let test = decode(&body).expect("test");
        assert_eq!(
            test.exception.map(|e| e.stack_flags_address),
            Some(0x1122_3344)
        );
        assert_eq!(test.name, "gp");
    }

    #[test]
    fn short_hash_fails() {
        let mut body = 0u32.to_le_bytes().to_vec();
        body.extend(chunk(b"HASH", &[0; 19]));
        assert!(matches!(
            decode(&body),
            Err(MooError::TruncatedInput { .. })
        ));
    }

    fn with_states(initial: RegisterSet, r#final: RegisterSet) -> Test {
        let width = initial.width();
        let mut test = Test {
            index: 0,
            name: String::new(),
            bytes: Vec::new(),
            initial: CpuState::empty(width),
            r#final: CpuState::empty(width),
            cycles: Vec::new(),
            exception: None,
            hash: None,
            gen_metadata: None,
        };
        test.initial.registers = initial;
        test.r#final.registers = r#final;
        test
    }

    #[test]
    fn masked_final_value_precedence() {
        let w = RegisterWidth::Sixteen;
        let mut test = with_states(
            RegisterSet::from_values(w, &[(Register::FLAGS, 0xF002), (Register::AX, 0xFFFF)]),
            RegisterSet::from_values(w, &[(Register::FLAGS, 0xF8D7)]),
        );
        let file_mask =
            RegisterMask::from_set(RegisterSet::from_values(w, &[(Register::FLAGS, 0xF72A)]));

        assert_eq!(test.final_value_masked(Register::FLAGS, None), Some(0xF8D7));
        assert_eq!(
            test.final_value_masked(Register::FLAGS, Some(&file_mask)),
            Some(0xF8D7 & 0xF72A)
        );
        // Unchanged and unmasked registers pass through.
        assert_eq!(
            test.final_value_masked(Register::AX, Some(&file_mask)),
            Some(0xFFFF)
        );

        test.r#final.masks = Some(RegisterMask::from_set(RegisterSet::from_values(
            w,
            &[(Register::FLAGS, 0x00FF)],
        )));
        assert_eq!(
            test.final_value_masked(Register::FLAGS, Some(&file_mask)),
            Some(0x00D7)
        );
    }

    #[test]
    fn diff_lists_changed_registers_only() {
        let w = RegisterWidth::Sixteen;
        let test = with_states(
            RegisterSet::from_values(w, &[(Register::AX, 1), (Register::BX, 2), (Register::CX, 3)]),
            RegisterSet::from_values(w, &[(Register::AX, 9), (Register::CX, 3)]),
        );
        assert_eq!(
            test.register_diff(),
            [RegisterDiff {
                register: Register::AX,
                initial: 1,
                r#final: 9
            }]
        );
    }

    #[test]
    fn flags_diff_uses_flags_register_for_width() {
        let w = RegisterWidth::Sixteen;
        // ZF set, CF and IF cleared.
        let test = with_states(
            RegisterSet::from_values(w, &[(Register::FLAGS, 0xF203)]),
            RegisterSet::from_values(w, &[(Register::FLAGS, 0xF042)]),
        );
        let diff = test.flags_diff();
        assert_eq!(diff.set, [Flag::ZF]);
        assert_eq!(diff.cleared, [Flag::CF, Flag::IF]);

        let w = RegisterWidth::ThirtyTwo;
        let test = with_states(
            RegisterSet::from_values(w, &[(Register::EFLAGS, 0x0000_0002)]),
            RegisterSet::from_values(w, &[(Register::EFLAGS, 0x0002_0802)]),
        );
        let diff = test.flags_diff();
        assert_eq!(diff.set, [Flag::OF, Flag::VM]);
        assert!(diff.cleared.is_empty());
    }

    #[test]
    fn flags_diff_empty_without_final_flags() {
        let w = RegisterWidth::Sixteen;
        let test = with_states(
            RegisterSet::from_values(w, &[(Register::FLAGS, 0xF203), (Register::AX, 1)]),
            RegisterSet::from_values(w, &[(Register::AX, 2)]),
        );
        assert!(test.flags_diff().is_empty());
    }
}
