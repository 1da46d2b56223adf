//! # RocksDB Ledger Adapter
//!
//! Persistent implementation of [`LedgerStore`].
//!
//! ## Layout
//!
//! - default column family: `key -> version (u64 big-endian) ++ value`
//! - `meta` column family: the commit sequence counter
//!
//! Commits take a mutex, validate the read set with point lookups, then apply
//! every write plus the new sequence in one `WriteBatch`.

use crate::domain::entities::ABSENT_VERSION;
use crate::domain::{ChangeSet, LedgerError, VersionedValue};
use crate::ports::{LedgerStore, RangeScan};
use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Column family holding ledger metadata.
pub const CF_META: &str = "meta";

const SEQUENCE_KEY: &[u8] = b"sequence";
const VERSION_LEN: usize = 8;

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksDbLedgerConfig {
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB)
    pub write_buffer_size: usize,
    /// fsync after each commit (default: true)
    pub sync_writes: bool,
}

impl Default for RocksDbLedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/ledger"),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbLedgerConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 2 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed versioned ledger.
pub struct RocksDbLedger {
    db: DB,
    config: RocksDbLedgerConfig,
    commit_lock: Mutex<()>,
    sequence: AtomicU64,
}

impl RocksDbLedger {
    /// Open or create the database.
    pub fn open(config: RocksDbLedgerConfig) -> Result<Self, LedgerError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_META, Options::default())];

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| LedgerError::Backend(format!("Failed to open RocksDB: {e}")))?;

        let sequence = {
            let meta = db
                .cf_handle(CF_META)
                .ok_or_else(|| LedgerError::Backend("missing meta column family".into()))?;
            match db
                .get_cf(meta, SEQUENCE_KEY)
                .map_err(|e| LedgerError::Backend(format!("RocksDB get failed: {e}")))?
            {
                Some(raw) => decode_u64("sequence", &raw)?,
                None => 0,
            }
        };

        info!(path = %config.path.display(), sequence, "[fl-01] RocksDB ledger opened");

        Ok(Self {
            db,
            config,
            commit_lock: Mutex::new(()),
            sequence: AtomicU64::new(sequence),
        })
    }

    fn current_version(&self, key: &str) -> Result<u64, LedgerError> {
        Ok(self.get(key)?.map_or(ABSENT_VERSION, |v| v.version))
    }
}

fn decode_u64(key: &str, raw: &[u8]) -> Result<u64, LedgerError> {
    let bytes: [u8; VERSION_LEN] = raw
        .get(..VERSION_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| LedgerError::Corrupted {
            key: key.to_string(),
            reason: format!("expected at least {VERSION_LEN} bytes, found {}", raw.len()),
        })?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_entry(key: &str, raw: &[u8]) -> Result<VersionedValue, LedgerError> {
    let version = decode_u64(key, raw)?;
    Ok(VersionedValue::new(raw[VERSION_LEN..].to_vec(), version))
}

fn encode_entry(version: u64, value: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(VERSION_LEN + value.len());
    raw.extend_from_slice(&version.to_be_bytes());
    raw.extend_from_slice(value);
    raw
}

impl LedgerStore for RocksDbLedger {
    fn get(&self, key: &str) -> Result<Option<VersionedValue>, LedgerError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| LedgerError::Backend(format!("RocksDB get failed: {e}")))?
            .map(|raw| decode_entry(key, &raw))
            .transpose()
    }

    fn scan_page(
        &self,
        low: &str,
        high: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, VersionedValue)>, LedgerError> {
        let start = after.filter(|key| *key >= low).unwrap_or(low);
        let mut results = Vec::new();

        let iter = self
            .db
            .iterator(IteratorMode::From(start.as_bytes(), Direction::Forward));

        for item in iter {
            let (raw_key, raw_value) =
                item.map_err(|e| LedgerError::Backend(format!("RocksDB scan failed: {e}")))?;
            if raw_key.as_ref() >= high.as_bytes() || results.len() >= limit {
                break;
            }
            if after.is_some_and(|a| raw_key.as_ref() == a.as_bytes()) {
                continue;
            }
            let key = String::from_utf8(raw_key.to_vec()).map_err(|e| LedgerError::Corrupted {
                key: String::from_utf8_lossy(&raw_key).into_owned(),
                reason: e.to_string(),
            })?;
            let entry = decode_entry(&key, &raw_value)?;
            results.push((key, entry));
        }

        Ok(results)
    }

    fn commit(&self, changes: ChangeSet) -> Result<u64, LedgerError> {
        let _guard = self.commit_lock.lock();

        for (key, observed) in &changes.reads {
            let current = self.current_version(key)?;
            if current != *observed {
                debug!(key = %key, observed, current, "[fl-01] Commit rejected: stale read");
                return Err(LedgerError::Conflict {
                    key: key.clone(),
                    observed: *observed,
                    current,
                });
            }
        }

        let sequence = self.sequence.load(Ordering::SeqCst);
        if changes.is_read_only() {
            return Ok(sequence);
        }

        let next = sequence + 1;
        let meta = self
            .db
            .cf_handle(CF_META)
            .ok_or_else(|| LedgerError::Backend("missing meta column family".into()))?;

        let mut batch = WriteBatch::default();
        for (key, value) in &changes.writes {
            batch.put(key.as_bytes(), encode_entry(next, value));
        }
        batch.put_cf(meta, SEQUENCE_KEY, next.to_be_bytes());

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);

        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| LedgerError::Backend(format!("RocksDB batch write failed: {e}")))?;

        self.sequence.store(next, Ordering::SeqCst);
        debug!(sequence = next, writes = changes.writes.len(), "[fl-01] Commit applied");
        Ok(next)
    }

    fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    fn range_scan<'a>(&'a self, low: &str, high: &str) -> RangeScan<'a> {
        RangeScan::new(self, low, high)
    }
}
