//! # Data Directory
//!
//! Exclusive ownership of the data directory and a free-space check before a
//! persistent ledger is opened.

use crate::error::NodeError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const LOCK_FILE: &str = "LOCK";

/// Advisory lock on `<data_dir>/LOCK`, released on drop.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    /// Create `data_dir` if needed and take the lock without blocking.
    pub fn acquire(data_dir: &Path) -> Result<Self, NodeError> {
        fs::create_dir_all(data_dir).map_err(|e| NodeError::io(data_dir, e))?;
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| NodeError::io(&path, e))?;

        file.try_lock_exclusive()
            .map_err(|_| NodeError::DataDirLocked(data_dir.to_path_buf()))?;
        info!("Acquired data directory lock {:?}", path);
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release {:?}: {}", self.path, e);
        }
    }
}

/// Free space of the filesystem holding `path`, in whole percent.
pub fn available_disk_space_percent(path: &Path) -> Result<u8, NodeError> {
    let available = fs2::available_space(path).map_err(|e| NodeError::io(path, e))?;
    let total = fs2::total_space(path).map_err(|e| NodeError::io(path, e))?;
    if total == 0 {
        return Err(NodeError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::Other, "unable to determine disk space"),
        ));
    }
    Ok(((available as f64 / total as f64) * 100.0) as u8)
}

/// Fail unless at least `required_percent` of the disk is free.
pub fn ensure_disk_space(path: &Path, required_percent: u8) -> Result<(), NodeError> {
    let available_percent = available_disk_space_percent(path)?;
    if available_percent < required_percent {
        return Err(NodeError::LowDiskSpace {
            available_percent,
            required_percent,
        });
    }
    Ok(())
}
