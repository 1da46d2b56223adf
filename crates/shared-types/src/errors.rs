//! # Error Types
//!
//! The error taxonomy surfaced by every federation operation. Any error aborts
//! the whole call; nothing buffered before it reaches the ledger.

use crate::entities::{Round, SessionStatus};
use std::fmt;
use thiserror::Error;

/// Kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Session,
    Budget,
    Update,
    Aggregation,
    Agreement,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Session => "session",
            Self::Budget => "privacy budget",
            Self::Update => "model update",
            Self::Aggregation => "aggregation",
            Self::Agreement => "agreement",
        };
        f.write_str(name)
    }
}

/// Request is well-formed but the current state does not allow it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateConflict {
    #[error("session is {actual}, expected {expected}")]
    WrongStatus {
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("round mismatch: submitted {submitted}, current round is {current}")]
    RoundMismatch { submitted: Round, current: Round },

    #[error("organization {org} is not a participant")]
    NotParticipant { org: String },

    #[error("update already submitted by {org} for round {round}")]
    DuplicateSubmission { org: String, round: Round },

    #[error("organization {org} already joined")]
    AlreadyJoined { org: String },

    #[error("participant limit of {limit} reached")]
    ParticipantLimit { limit: usize },

    #[error("insufficient participants: have {have}, need {need}")]
    InsufficientParticipants { have: usize, need: usize },

    #[error("session already {status}")]
    AlreadyTerminal { status: SessionStatus },

    #[error("agreement {agreement_id} is not active")]
    InactiveAgreement { agreement_id: String },
}

/// Errors returned by federation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlError {
    /// Missing or malformed input.
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// Resolved caller is not allowed to perform the operation.
    #[error("Unauthorized: {org}: {reason}")]
    Authorization { org: String, reason: String },

    #[error("State conflict: {0}")]
    StateConflict(#[from] StateConflict),

    /// Privacy budget cannot cover the requested epsilon.
    #[error("Privacy budget exhausted: remaining {remaining}, requested {requested}")]
    ResourceExhausted { remaining: f64, requested: f64 },

    /// The ledger rejected the commit because a read key changed underneath.
    #[error("Concurrency conflict on key {key}")]
    ConcurrencyConflict { key: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FlError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn unauthorized(org: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authorization {
            org: org.into(),
            reason: reason.into(),
        }
    }

    /// Only OCC conflicts may succeed when re-run with fresh reads.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl From<serde_json::Error> for FlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
