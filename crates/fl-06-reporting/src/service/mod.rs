//! # Reporting Services
//!
//! - [`StatsQuery`]: read-only reports. Never commits.
//! - [`AnomalyReporting`]: writes `flag:` records.

mod flags;
mod query;

pub use flags::AnomalyReporting;
pub use query::StatsQuery;

use fl_01_ledger::{LedgerStore, RangeScan};
use serde::de::DeserializeOwned;
use shared_types::FlError;

/// Decode every value of a scan as `T`.
fn decoded<'a, T: DeserializeOwned + 'a>(
    scan: RangeScan<'a>,
) -> impl Iterator<Item = Result<T, FlError>> + 'a {
    scan.map(|entry| -> Result<T, FlError> {
        let (_, versioned) = entry?;
        Ok(serde_json::from_slice(&versioned.value)?)
    })
}

fn get_json<T: DeserializeOwned>(ledger: &dyn LedgerStore, key: &str) -> Result<Option<T>, FlError> {
    match ledger.get(key)? {
        Some(versioned) => Ok(Some(serde_json::from_slice(&versioned.value)?)),
        None => Ok(None),
    }
}
