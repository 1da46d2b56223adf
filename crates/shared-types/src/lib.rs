//! # Shared Types Crate
//!
//! Domain records, identifiers, the ledger key scheme and the error taxonomy
//! used by every federation subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every record that crosses a crate boundary is
//!   defined here, together with the key it is stored under.
//! - **Records are plain data**: state transitions live in the owning
//!   subsystem's `domain` module as pure functions over these types.
//! - **Resolved identity only**: operations receive a [`CallContext`] and a
//!   host-supplied [`IdentityResolver`]; no signature checks happen here.
//!
//! ## Record Ownership
//!
//! | Record | Sole writer |
//! |--------|-------------|
//! | `FlSession` | fl-05 Session Manager (fl-03/fl-04 within the submit call) |
//! | `PrivacyBudgetRecord` | fl-02 Privacy Budget Ledger |
//! | `ModelUpdateRecord` | fl-04 Update Intake |
//! | `AggregationRecord` | fl-03 Aggregation |
//! | `AnomalyFlag` | fl-06 Reporting |

pub mod entities;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod keys;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use identity::{CallContext, IdentityResolver, StaticIdentityResolver, TrustedPrincipalResolver};
pub use ids::{
    aggregated_model_hash, derive_update_id, IdGenerator, SequentialIdGenerator, UuidIdGenerator,
};
pub use keys::{prefix_end, prefix_range, validate_component, KeyPrefix};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};

/// Upper bound on organizations in one session.
pub const MAX_PARTICIPANTS: usize = 3;

/// Anomaly scores at or above this value mark an update invalid.
pub const ANOMALY_THRESHOLD: f64 = 0.7;
