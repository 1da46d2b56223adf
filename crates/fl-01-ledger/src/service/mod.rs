//! # Ledger Transaction
//!
//! The unit of work every federation operation runs in.

use crate::domain::entities::ABSENT_VERSION;
use crate::domain::{ChangeSet, LedgerError};
use crate::ports::{LedgerStore, RangeScan};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Optimistic transaction over a [`LedgerStore`].
///
/// Point reads record the version observed (absent = 0) and see the
/// transaction's own buffered writes. Nothing reaches the store until
/// [`commit`](Self::commit); dropping the transaction discards it.
pub struct LedgerTransaction<'a> {
    store: &'a dyn LedgerStore,
    changes: ChangeSet,
}

impl<'a> LedgerTransaction<'a> {
    pub fn begin(store: &'a dyn LedgerStore) -> Self {
        Self {
            store,
            changes: ChangeSet::new(),
        }
    }

    /// Read raw bytes, recording the observed version.
    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(buffered) = self.changes.writes.get(key) {
            return Ok(Some(buffered.clone()));
        }
        let entry = self.store.get(key)?;
        let version = entry.as_ref().map_or(ABSENT_VERSION, |e| e.version);
        self.changes.record_read(key, version);
        Ok(entry.map(|e| e.value))
    }

    /// Read and decode a JSON record.
    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, LedgerError> {
        match self.get(key)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| LedgerError::Corrupted {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Existence check. Recorded like any other read.
    pub fn exists(&mut self, key: &str) -> Result<bool, LedgerError> {
        Ok(self.get(key)?.is_some())
    }

    /// Buffer a raw write.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.changes.record_write(key, value);
    }

    /// Buffer a JSON-encoded write.
    pub fn put_json<T: Serialize>(&mut self, key: impl Into<String>, record: &T) -> Result<(), LedgerError> {
        let raw = serde_json::to_vec(record)?;
        self.put(key, raw);
        Ok(())
    }

    /// Ordered scan over committed state in `[low, high)`.
    ///
    /// Scanned entries are not added to the read set and buffered writes are
    /// not visible through the scan.
    pub fn range_scan(&self, low: &str, high: &str) -> RangeScan<'a> {
        self.store.range_scan(low, high)
    }

    /// Keys read so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.changes.reads.len()
    }

    /// Writes buffered so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.changes.writes.len()
    }

    /// Validate and apply. Returns the commit sequence.
    pub fn commit(self) -> Result<u64, LedgerError> {
        self.store.commit(self.changes)
    }
}
