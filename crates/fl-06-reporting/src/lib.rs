//! # Reporting (fl-06)
//!
//! **Subsystem ID:** 6
//!
//! Read-only statistics over the ledger plus free-standing anomaly flags.
//!
//! ## Operations
//!
//! | Operation | Reads |
//! |-----------|-------|
//! | `get_session_details` | session, its updates and aggregations |
//! | `get_session_progress` | session, its aggregations |
//! | `get_model_history` | session, its updates and aggregations |
//! | `get_privacy_budget_status` | one budget, or every `budget:` record |
//! | `get_system_stats` | every session and budget |
//! | `get_organization_performance` | every session and budget, the org's updates |
//! | `get_available_sessions` / `get_my_sessions` | every session |
//! | `flag_anomalous_update` | writes one `flag:` record |
//!
//! Queries stream over `RangeScan`; none of them commit. Rounds are listed in
//! ascending order and the updates of a round by organization id.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod service;

pub use domain::{
    AvailableSession, BudgetSummary, BudgetUsage, FlagRequest, ModelHistory, MySession,
    OrganizationPerformance, PrivacyBudgetStatus, SessionDetails, SessionProgress, SystemStats,
};
pub use service::{AnomalyReporting, StatsQuery};
