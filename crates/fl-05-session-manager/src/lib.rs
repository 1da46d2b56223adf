//! # Session Manager (fl-05)
//!
//! **Subsystem ID:** 5
//!
//! Owns the session lifecycle and exposes the write-side operation surface
//! through [`FederationCoordinator`].
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Enforcement Location |
//! |----|-----------|---------------------|
//! | 1 | Participant Limit | at most `MAX_PARTICIPANTS` (3), checked on create and join |
//! | 2 | Start Quorum | `participants.len() >= min_participants` to start |
//! | 3 | Frozen Membership | joins only while `Initialized` |
//! | 4 | Terminal Finality | `Completed` / `Failed` accept no transition |
//! | 5 | Agreement Policy | `domain::check_agreement` on create and join |
//!
//! ## State Machine
//!
//! ```text
//! [Initialized] ──start (>= min participants)──→ [Active] ──round loop (fl-04/fl-03)──→ [Active]
//!       │                                            │
//!       └──────────── complete (manual) ─────────────┴──→ [Completed]
//!                                                    └──→ [Failed] (quorum lost)
//! ```
//!
//! ## Authorization
//!
//! | Operation | Allowed caller |
//! |-----------|----------------|
//! | `create_session` | any resolved org (becomes `created_by`) |
//! | `start_session` | creator, participant or administrator |
//! | `join_session` | the joining org itself |
//! | `complete_session` | creator, participant or administrator |
//! | `update_privacy_budget` | administrator |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! - `domain/` - requests and pure lifecycle transitions
//! - `ports/` - `AgreementValidator`
//! - `adapters/` - ledger-backed agreement registry, permissive validator
//! - `service/` - `SessionManager`, `FederationCoordinator`, `CoordinatorConfig`

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{AgreementMode, LedgerAgreementRegistry, PermissiveAgreementValidator};
pub use domain::CreateSessionRequest;
pub use ports::AgreementValidator;
pub use service::{CoordinatorConfig, CoordinatorDeps, FederationCoordinator, SessionManager};
