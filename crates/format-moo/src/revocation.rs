//! Revocation lists: hashes of tests retroactively deemed invalid.
//!
//! The list is plain text with one 40-character hex hash per line. Blank
//! lines and lines starting with `#` are ignored. Any other line that is
//! not a valid hash is skipped and recorded as an [`Anomaly`]; the list is
//! advisory, so a bad line never fails the load.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use crate::error::Anomaly;
use crate::hash::TestHash;
use crate::test::Test;

/// A read-only set of revoked test hashes.
#[derive(Debug, Clone, Default)]
pub struct RevocationSet {
    hashes: HashSet<TestHash>,
    skipped: Vec<Anomaly>,
}

impl RevocationSet {
    pub fn parse(text: &str) -> Self {
        let mut set = Self::default();
        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.parse::<TestHash>() {
                Ok(hash) => {
                    set.hashes.insert(hash);
                }
                Err(e) => {
                    let anomaly = Anomaly::MalformedRevocationEntry {
                        line: line_num + 1,
                        text: line.to_string(),
                    };
                    log::warn!("{anomaly} ({e})");
                    set.skipped.push(anomaly);
                }
            }
        }
        set
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let set = Self::parse(&std::fs::read_to_string(path)?);
        log::info!(
            "Loaded {} revoked hashes from {} ({} lines skipped)",
            set.len(),
            path.display(),
            set.skipped.len()
        );
        Ok(set)
    }

    pub fn contains(&self, hash: &TestHash) -> bool {
        self.hashes.contains(hash)
    }

    /// A test without a hash can never be revoked.
    pub fn is_revoked(&self, test: &Test) -> bool {
        test.hash.as_ref().is_some_and(|h| self.contains(h))
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Lines that were skipped while parsing.
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.skipped
    }
}
