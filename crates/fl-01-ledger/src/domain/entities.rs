//! Ledger values and the change sets submitted at commit.

use std::collections::BTreeMap;

/// Commit sequence that last wrote a key. Absent keys are version 0.
pub type Version = u64;

/// Version reported for a key that does not exist.
pub const ABSENT_VERSION: Version = 0;

/// A stored value together with the commit that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: Version,
}

impl VersionedValue {
    #[must_use]
    pub fn new(value: Vec<u8>, version: Version) -> Self {
        Self { value, version }
    }
}

/// Everything a transaction observed and wants to write.
///
/// `reads` maps each key read to the version seen; `writes` holds the
/// buffered puts in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub reads: BTreeMap<String, Version>,
    pub writes: BTreeMap<String, Vec<u8>>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the version observed for `key`. The first observation wins.
    pub fn record_read(&mut self, key: &str, version: Version) {
        self.reads.entry(key.to_string()).or_insert(version);
    }

    pub fn record_write(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.writes.insert(key.into(), value);
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}
