//! # Node Errors
//!
//! Startup and wiring failures. Operation errors stay `FlError`.

use crate::container::ConfigError;
use fl_01_ledger::LedgerError;
use shared_types::FlError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data directory {0} is locked by another process")]
    DataDirLocked(PathBuf),

    #[error("insufficient disk space: {available_percent}% free, {required_percent}% required")]
    LowDiskSpace {
        available_percent: u8,
        required_percent: u8,
    },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("federation error: {0}")]
    Federation(#[from] FlError),
}

impl NodeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
