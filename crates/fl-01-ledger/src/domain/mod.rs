//! # Domain Layer
//!
//! - `entities` - versioned values and change sets
//! - `errors` - ledger error type

pub mod entities;
pub mod errors;

pub use entities::{ChangeSet, Version, VersionedValue};
pub use errors::LedgerError;
