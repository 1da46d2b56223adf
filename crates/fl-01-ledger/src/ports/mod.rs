//! # Outbound Ports (Driven Ports)
//!
//! The storage interface the host ledger must provide.
//!
//! Production: `RocksDbLedger` (feature `rocksdb`)
//! Testing: `InMemoryLedger`

use crate::domain::{ChangeSet, LedgerError, VersionedValue};
use std::collections::VecDeque;

/// Entries fetched per round-trip by [`RangeScan`].
pub const DEFAULT_SCAN_PAGE: usize = 64;

/// Versioned key-value store with atomic, validated commits.
pub trait LedgerStore: Send + Sync {
    /// Get a value and the version that wrote it.
    fn get(&self, key: &str) -> Result<Option<VersionedValue>, LedgerError>;

    /// Up to `limit` entries in `[low, high)` in key order, strictly after
    /// `after` when given.
    fn scan_page(
        &self,
        low: &str,
        high: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, VersionedValue)>, LedgerError>;

    /// Validate `changes.reads` and apply `changes.writes` atomically.
    ///
    /// Returns the commit sequence. A read-only change set is validated but
    /// does not advance the sequence.
    fn commit(&self, changes: ChangeSet) -> Result<u64, LedgerError>;

    /// Sequence of the latest successful commit.
    fn last_sequence(&self) -> u64;

    /// Ordered, lazy scan over `[low, high)`.
    fn range_scan<'a>(&'a self, low: &str, high: &str) -> RangeScan<'a>;
}

/// Ordered, single-pass iterator over a key range.
///
/// Entries are pulled from the store one page at a time, so no lock is held
/// between calls to `next`. The scan is not a snapshot: commits landing
/// mid-scan may or may not be visible.
pub struct RangeScan<'a> {
    store: &'a dyn LedgerStore,
    low: String,
    high: String,
    last_key: Option<String>,
    page: VecDeque<(String, VersionedValue)>,
    page_size: usize,
    done: bool,
}

impl<'a> RangeScan<'a> {
    pub fn new(store: &'a dyn LedgerStore, low: &str, high: &str) -> Self {
        Self {
            store,
            low: low.to_string(),
            high: high.to_string(),
            last_key: None,
            page: VecDeque::new(),
            page_size: DEFAULT_SCAN_PAGE,
            done: low >= high,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stop the scan early and release buffered entries.
    pub fn close(&mut self) {
        self.done = true;
        self.page.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.done && self.page.is_empty()
    }

    fn refill(&mut self) -> Result<(), LedgerError> {
        let fetched = self.store.scan_page(
            &self.low,
            &self.high,
            self.last_key.as_deref(),
            self.page_size,
        )?;
        if fetched.len() < self.page_size {
            self.done = true;
        }
        if let Some((key, _)) = fetched.last() {
            self.last_key = Some(key.clone());
        }
        self.page.extend(fetched);
        Ok(())
    }
}

impl Iterator for RangeScan<'_> {
    type Item = Result<(String, VersionedValue), LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.done {
            if let Err(e) = self.refill() {
                self.close();
                return Some(Err(e));
            }
        }
        self.page.pop_front().map(Ok)
    }
}
