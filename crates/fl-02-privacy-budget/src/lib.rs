//! # Privacy Budget Ledger (fl-02)
//!
//! **Subsystem ID:** 2
//!
//! Bookkeeping of the epsilon each organization may still spend, per session
//! and globally. No noise mechanism lives here; the ledger only tracks the
//! budget that submitters declare.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | 1 | Bounded Remaining | `0 <= remaining <= total` (`domain::reserve`, `domain::apply_adjustment`) |
//! | 2 | Spend Only On Acceptance | `check_and_reserve` runs inside the submitting transaction |
//! | 3 | Refill Only By Adjustment | `domain::apply_adjustment` is the only increasing path |
//! | 4 | Sole Mutator | no other crate writes `budget:` keys |
//!
//! ## Budget Lifecycle
//!
//! ```text
//! open (total = remaining = max_rounds * epsilon)
//!   ──reserve(amount)──→ remaining -= amount   (ResourceExhausted if short)
//!   ──adjust──────────→ total/remaining changed by an administrator
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod service;

pub use domain::{BudgetAdjustment, DEFAULT_ADJUSTMENT_REASON, DEFAULT_GLOBAL_BUDGET};
pub use service::PrivacyBudgetLedger;
