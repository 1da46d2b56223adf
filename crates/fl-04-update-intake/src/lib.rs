//! # Update Intake (fl-04)
//!
//! **Subsystem ID:** 4
//!
//! Admits one participant's per-round update: validates it, charges the
//! privacy budget, scores it, stores it, and closes the round when it is the
//! last expected submission.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | 1 | One Update Per (session, round, org) | `service` existence check on the update key |
//! | 2 | Current Round Only | `domain::check_admissible` |
//! | 3 | Declared Participants Only | `domain::check_admissible` |
//! | 4 | Pure Scoring | `domain::anomaly_score` depends on metrics alone |
//! | 5 | All Or Nothing | one `LedgerTransaction` per submission |
//!
//! ## Submission Flow
//!
//! ```text
//! validate ─→ resolve caller ─→ load session ─→ admissible? ─→ duplicate?
//!    ─→ reserve budget ─→ score ─→ store update ─→ round complete?
//!         ├── yes ─→ fl-03 close_round (writes session + aggregation)
//!         └── no  ─→ write session counters
//!    ─→ commit ─→ publish events
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod service;

pub use domain::{anomaly_score, check_admissible, submission_score, SubmitModelUpdateRequest};
pub use service::{SubmissionReceipt, UpdateIntake};
