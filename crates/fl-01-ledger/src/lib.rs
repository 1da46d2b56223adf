//! # Versioned Ledger (fl-01)
//!
//! **Subsystem ID:** 1
//!
//! Every federation operation runs as one [`LedgerTransaction`] against a
//! [`LedgerStore`]: reads record the version they observed, writes are
//! buffered, and the commit applies all writes or none.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | 1 | Atomic Commit | `adapters/memory.rs`, `adapters/rocksdb.rs` - single write batch |
//! | 2 | Read Validation | every read key must still carry its observed version (absent = 0) |
//! | 3 | Linearized Commits | one lock (memory) or commit mutex (RocksDB) per store |
//! | 4 | Monotonic Versions | each commit stamps its writes with a fresh sequence number |
//!
//! ## Optimistic Concurrency
//!
//! ```text
//! begin ──get/put──→ ChangeSet{reads, writes} ──commit──→ Ok(sequence)
//!                                                  │
//!                                                  └── stale read ──→ Err(Conflict{key})
//! ```
//!
//! The store never retries. Callers that want retry re-run the whole
//! operation with fresh reads.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! - `domain/` - `VersionedValue`, `ChangeSet`, `LedgerError`
//! - `ports/` - `LedgerStore` trait and the paged `RangeScan`
//! - `adapters/` - `InMemoryLedger`, `RocksDbLedger` (feature `rocksdb`)
//! - `service/` - `LedgerTransaction`

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryLedger;
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbLedger, RocksDbLedgerConfig};
pub use domain::{ChangeSet, LedgerError, Version, VersionedValue};
pub use ports::{LedgerStore, RangeScan, DEFAULT_SCAN_PAGE};
pub use service::LedgerTransaction;
