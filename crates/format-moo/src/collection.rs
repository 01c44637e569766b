//! Whole-file decoding and the hash index over decoded tests.

use std::collections::{BTreeSet, HashMap};
use std::collections::hash_map::Entry;
use std::ops::Index;

use crate::DecodeOptions;
use crate::chunk::ChunkTag;
use crate::cpu::{BusStatus, CpuFamily, CpuType, TState};
use crate::cycle::Cycle;
use crate::cursor::Cursor;
use crate::error::{Anomaly, MooError};
use crate::flags::Flag;
use crate::hash::TestHash;
use crate::header::{FileHeader, FileMetadata, FormatVersion};
use crate::registers::{Register, RegisterMask, RegisterWidth};
use crate::revocation::RevocationSet;
use crate::test::Test;

/// Smallest possible `TEST` chunk: header plus the index field.
const MIN_TEST_CHUNK_LEN: usize = 12;

/// Every test from one MOO file, in file order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TestCollection {
    header: FileHeader,
    metadata: Option<FileMetadata>,
    global_mask: Option<RegisterMask>,
    tests: Vec<Test>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: HashMap<TestHash, usize>,
    #[cfg_attr(feature = "serde", serde(skip))]
    anomalies: Vec<Anomaly>,
}

/// Summary counts over a collection.
///
/// Bus transfers are counted once each. A transfer opens on its ALE cycle,
/// which also fixes its type (code fetch or data read), and is counted
/// when it completes with a read or write command asserted: on the ALE
/// cycle itself for the pipelined 386 bus, on the first passive cycle for
/// every other CPU.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CollectionStats {
    pub tests: usize,
    pub with_exception: usize,
    pub without_hash: usize,
    pub total_cycles: usize,
    pub min_cycles: usize,
    pub max_cycles: usize,
    pub avg_cycles: f64,
    pub code_fetches: usize,
    /// Data reads; code fetches are counted separately.
    pub mem_reads: usize,
    pub mem_writes: usize,
    pub io_reads: usize,
    pub io_writes: usize,
    pub wait_states: usize,
    /// Distinct exception numbers, ascending.
    pub exceptions_seen: Vec<u8>,
    /// Registers changed by at least one test that raised no exception.
    pub registers_modified: Vec<Register>,
    pub flags_set: Vec<Flag>,
    pub flags_cleared: Vec<Flag>,
}

impl CollectionStats {
    /// Flags some test set or cleared.
    pub fn flags_modified(&self) -> Vec<Flag> {
        let mut flags: Vec<Flag> = self
            .flags_set
            .iter()
            .chain(&self.flags_cleared)
            .copied()
            .collect();
        flags.sort_unstable();
        flags.dedup();
        flags
    }

    /// Flags some test set and none cleared.
    pub fn flags_always_set(&self) -> Vec<Flag> {
        only_in(&self.flags_set, &self.flags_cleared)
    }

    /// Flags some test cleared and none set.
    pub fn flags_always_cleared(&self) -> Vec<Flag> {
        only_in(&self.flags_cleared, &self.flags_set)
    }

    fn tally_bus(&mut self, cycles: &[Cycle], cpu: CpuType) {
        let pipelined = cpu.family() == CpuFamily::Intel80386;
        let mut open: Option<BusStatus> = None;
        for c in cycles {
            if c.t_state() == Some(TState::Tw) {
                self.wait_states += 1;
            }
            if c.ale() {
                open = Some(c.bus_state(cpu));
            }
            let completes = if pipelined {
                c.ale()
            } else {
                c.bus_state(cpu) == BusStatus::Passive
            };
            let Some(status) = open.filter(|_| completes) else {
                continue;
            };

            let counter = if c.is_reading_mem() {
                if status == BusStatus::CodeFetch {
                    &mut self.code_fetches
                } else {
                    &mut self.mem_reads
                }
            } else if c.is_writing_mem() || c.is_advanced_writing_mem() {
                &mut self.mem_writes
            } else if c.is_reading_io() {
                &mut self.io_reads
            } else if c.is_writing_io() || c.is_advanced_writing_io() {
                &mut self.io_writes
            } else {
                continue;
            };
            *counter += 1;
            open = None;
        }
    }
}

fn only_in(flags: &[Flag], other: &[Flag]) -> Vec<Flag> {
    flags.iter().filter(|f| !other.contains(f)).copied().collect()
}

impl TestCollection {
    /// Decode a complete MOO file with default options.
    pub fn parse(data: &[u8]) -> Result<Self, MooError> {
        Self::parse_with(data, DecodeOptions::default())
    }

    /// Decode a complete MOO file.
    ///
    /// Any structural error aborts the whole decode; no partial collection
    /// is returned.
    pub fn parse_with(data: &[u8], options: DecodeOptions) -> Result<Self, MooError> {
        let mut cursor = Cursor::new(data);
        let header = FileHeader::decode(&mut cursor)?;

        let capacity = (header.test_count as usize).min(cursor.remaining() / MIN_TEST_CHUNK_LEN);
        let mut collection = Self {
            header,
            metadata: None,
            global_mask: None,
            tests: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            anomalies: Vec::new(),
        };

        while collection.tests.len() < collection.header.test_count as usize {
            let mut chunk = cursor.next_chunk()?;
            match chunk.tag() {
                ChunkTag::TEST => {
                    let test = Test::decode(chunk, &collection.header)?;
                    collection.push(test, options)?;
                }
                ChunkTag::FILE_METADATA => {
                    collection.metadata = Some(FileMetadata::decode(&mut chunk.payload)?);
                }
                ChunkTag::MASKS_16 if collection.header.version.has_register_masks() => {
                    collection.global_mask =
                        Some(RegisterMask::decode(&mut chunk.payload, RegisterWidth::Sixteen)?);
                }
                ChunkTag::MASKS_32 if collection.header.version.has_register_masks() => {
                    collection.global_mask =
                        Some(RegisterMask::decode(&mut chunk.payload, RegisterWidth::ThirtyTwo)?);
                }
                tag => log::trace!(
                    "skipping top-level {tag} chunk at offset {}",
                    chunk.header.payload_start
                ),
            }
        }

        log::debug!(
            "decoded {} {} tests ({} indexed, {} anomalies)",
            collection.tests.len(),
            collection.header.cpu,
            collection.index.len(),
            collection.anomalies.len()
        );

        Ok(collection)
    }

    fn push(&mut self, test: Test, options: DecodeOptions) -> Result<(), MooError> {
        let position = self.tests.len();
        if test.index as usize != position {
            self.record(Anomaly::TestIndexMismatch {
                expected: position as u32,
                found: test.index,
            });
        }

        if let Some(hash) = test.hash {
            match self.index.entry(hash) {
                Entry::Vacant(slot) => {
                    slot.insert(position);
                }
                Entry::Occupied(mut slot) => {
                    let first = *slot.get();
                    if options.strict_hashes {
                        return Err(MooError::DuplicateHash {
                            hash,
                            first,
                            second: position,
                        });
                    }
                    slot.insert(position);
                    self.record(Anomaly::DuplicateHash {
                        hash,
                        first,
                        second: position,
                    });
                }
            }
        }

        self.tests.push(test);
        Ok(())
    }

    fn record(&mut self, anomaly: Anomaly) {
        log::warn!("{anomaly}");
        self.anomalies.push(anomaly);
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn cpu(&self) -> CpuType {
        self.header.cpu
    }

    pub fn version(&self) -> FormatVersion {
        self.header.version
    }

    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    /// Mask applied to every test that has no final-state mask of its own.
    pub fn global_mask(&self) -> Option<&RegisterMask> {
        self.global_mask.as_ref()
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Test> {
        self.tests.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Test> {
        self.tests.iter()
    }

    pub fn find(&self, hash: &TestHash) -> Option<&Test> {
        self.position_of(hash).map(|i| &self.tests[i])
    }

    pub fn position_of(&self, hash: &TestHash) -> Option<usize> {
        self.index.get(hash).copied()
    }

    /// Non-fatal conditions found while decoding.
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Final value of `reg` in `test`, optionally with the governing mask
    /// (the test's own, else this collection's) applied.
    pub fn final_value(&self, test: &Test, reg: Register, masked: bool) -> Option<u32> {
        if masked {
            test.final_value_masked(reg, self.global_mask())
        } else {
            test.final_value(reg)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CollectionStats {
        let mut stats = CollectionStats {
            tests: self.tests.len(),
            ..CollectionStats::default()
        };
        let mut min_cycles = None;
        let mut exceptions = BTreeSet::new();
        let mut registers = BTreeSet::new();
        let mut flags_set = BTreeSet::new();
        let mut flags_cleared = BTreeSet::new();

        for test in &self.tests {
            let cycles = test.cycles.len();
            stats.total_cycles += cycles;
            stats.max_cycles = stats.max_cycles.max(cycles);
            min_cycles = Some(min_cycles.map_or(cycles, |m: usize| m.min(cycles)));
            stats.without_hash += usize::from(test.hash.is_none());
            stats.tally_bus(&test.cycles, self.header.cpu);

            match test.exception {
                Some(e) => {
                    stats.with_exception += 1;
                    exceptions.insert(e.number);
                }
                // Exception frames overwrite registers the instruction never touched.
                None => registers.extend(test.register_diff().iter().map(|d| d.register)),
            }

            let flags = test.flags_diff();
            flags_set.extend(flags.set);
            flags_cleared.extend(flags.cleared);
        }

        stats.min_cycles = min_cycles.unwrap_or(0);
        if stats.tests > 0 {
            stats.avg_cycles = stats.total_cycles as f64 / stats.tests as f64;
        }
        stats.exceptions_seen = exceptions.into_iter().collect();
        stats.registers_modified = registers.into_iter().collect();
        stats.flags_set = flags_set.into_iter().collect();
        stats.flags_cleared = flags_cleared.into_iter().collect();
        stats
    }

    /// Number of tests in this collection present in `revoked`.
    pub fn revoked_count(&self, revoked: &RevocationSet) -> usize {
        self.tests.iter().filter(|t| revoked.is_revoked(t)).count()
    }
}

impl Index<usize> for TestCollection {
    type Output = Test;

    fn index(&self, position: usize) -> &Test {
        &self.tests[position]
    }
}

impl<'a> IntoIterator for &'a TestCollection {
    type Item = &'a Test;
    type IntoIter = std::slice::Iter<'a, Test>;

    fn into_iter(self) -> Self::IntoIter {
        self.tests.iter()
    }
}
