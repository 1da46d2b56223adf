use shared_types::FlError;
use thiserror::Error;

/// Errors raised by ledger stores and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A key read by the transaction changed before commit.
    #[error("Version conflict on key {key}: observed {observed}, current {current}")]
    Conflict {
        key: String,
        observed: u64,
        current: u64,
    },

    /// Stored bytes could not be decoded.
    #[error("Corrupted entry {key}: {reason}")]
    Corrupted { key: String, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Underlying database failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<LedgerError> for FlError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict { key, .. } => FlError::ConcurrencyConflict { key },
            LedgerError::Serialization(msg) => FlError::Serialization(msg),
            other @ (LedgerError::Corrupted { .. } | LedgerError::Backend(_)) => {
                FlError::Storage(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
