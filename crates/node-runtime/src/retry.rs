//! # Conflict Retry
//!
//! The core never retries. Hosts re-run an operation from scratch when the
//! ledger rejected its commit, which re-reads every key.

use shared_types::FlError;
use tracing::debug;

/// Run `op` up to `max_attempts` times while it fails with a retryable error.
pub fn retry_on_conflict<T>(
    max_attempts: u32,
    mut op: impl FnMut() -> Result<T, FlError>,
) -> Result<T, FlError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                debug!("Attempt {}/{} conflicted: {}", attempt, max_attempts, e);
                attempt += 1;
            }
            result => return result,
        }
    }
}
