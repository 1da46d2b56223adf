//! In-memory ledger store.
//!
//! One `RwLock` over the versioned map linearizes commits: validation and
//! application happen under the same write guard.

use crate::domain::entities::ABSENT_VERSION;
use crate::domain::{ChangeSet, LedgerError, VersionedValue};
use crate::ports::{LedgerStore, RangeScan};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::debug;

#[derive(Default)]
struct LedgerState {
    entries: BTreeMap<String, VersionedValue>,
    sequence: u64,
}

/// Versioned `BTreeMap` behind a single lock.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for InMemoryLedger {
    fn get(&self, key: &str) -> Result<Option<VersionedValue>, LedgerError> {
        Ok(self.state.read().entries.get(key).cloned())
    }

    fn scan_page(
        &self,
        low: &str,
        high: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, VersionedValue)>, LedgerError> {
        let start_key = after.filter(|key| *key >= low).unwrap_or(low);
        if start_key >= high {
            return Ok(Vec::new());
        }
        let start = match after {
            Some(key) if key >= low => Bound::Excluded(key.to_string()),
            _ => Bound::Included(low.to_string()),
        };
        let state = self.state.read();
        Ok(state
            .entries
            .range::<String, _>((start, Bound::Excluded(high.to_string())))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, changes: ChangeSet) -> Result<u64, LedgerError> {
        let mut state = self.state.write();

        for (key, observed) in &changes.reads {
            let current = state
                .entries
                .get(key)
                .map_or(ABSENT_VERSION, |v| v.version);
            if current != *observed {
                debug!(key = %key, observed, current, "[fl-01] Commit rejected: stale read");
                return Err(LedgerError::Conflict {
                    key: key.clone(),
                    observed: *observed,
                    current,
                });
            }
        }

        if changes.is_read_only() {
            return Ok(state.sequence);
        }

        state.sequence += 1;
        let sequence = state.sequence;
        let writes = changes.writes.len();
        for (key, value) in changes.writes {
            state
                .entries
                .insert(key, VersionedValue::new(value, sequence));
        }

        debug!(sequence, writes, "[fl-01] Commit applied");
        Ok(sequence)
    }

    fn last_sequence(&self) -> u64 {
        self.state.read().sequence
    }

    fn range_scan<'a>(&'a self, low: &str, high: &str) -> RangeScan<'a> {
        RangeScan::new(self, low, high)
    }
}
