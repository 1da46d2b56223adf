//! # Ledger Adapters
//!
//! - `memory` - `InMemoryLedger` for tests and single-process demos
//! - `rocksdb` - `RocksDbLedger`, persistent (feature `rocksdb`)

pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

pub use memory::InMemoryLedger;
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbLedger, RocksDbLedgerConfig};
