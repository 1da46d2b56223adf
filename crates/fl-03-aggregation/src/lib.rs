//! # Round Barrier & Aggregation (fl-03)
//!
//! **Subsystem ID:** 3
//!
//! Decides, once every declared participant has submitted for a round,
//! whether the session aggregates and advances, completes, or fails.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | 1 | One Trigger Per Round | `domain::RoundBarrier::is_complete` on the call landing the last update |
//! | 2 | One Aggregation Per Round | `service::Aggregator::close_round` reads the aggregation key first |
//! | 3 | Quorum | fewer than `min_participants` valid updates fails the session |
//! | 4 | Bounded Rounds | `current_round` never passes `max_rounds` |
//!
//! ## Round Outcomes
//!
//! ```text
//! all submitted ──valid < min──→ [Failed]
//!      │
//!      └──valid >= min──→ aggregate ──round >= max or target hit──→ [Completed]
//!                                  └──otherwise──→ current_round += 1
//! ```
//!
//! Only scalar metrics are averaged; model weights never reach the ledger.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod service;

pub use domain::{aggregate_metrics, close_round, RoundBarrier, RoundOutcome};
pub use service::Aggregator;
