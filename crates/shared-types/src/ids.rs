//! # Identifiers
//!
//! Session ids are allocated through [`IdGenerator`]; update ids and
//! aggregated model hashes are derived from their natural keys, so no global
//! counter is ever read or written.

use crate::entities::Round;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates fresh session identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_session_id(&self) -> String;
}

/// `FL-<uuid v4>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_session_id(&self) -> String {
        format!("FL-{}", uuid::Uuid::new_v4())
    }
}

/// `FL-1`, `FL-2`, ... for deterministic tests and demos.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_session_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("FL-{n}")
    }
}

/// `UPD-` followed by the first 16 hex chars of SHA-256(`session|round|org`).
#[must_use]
pub fn derive_update_id(session_id: &str, round: Round, org_id: &str) -> String {
    let digest = Sha256::digest(format!("{session_id}|{round}|{org_id}").as_bytes());
    let hex = hex::encode(digest);
    format!("UPD-{}", &hex[..16])
}

/// Placeholder model hash: hex(SHA-256(`aggregated_<session>_<round>`)).
#[must_use]
pub fn aggregated_model_hash(session_id: &str, round: Round) -> String {
    hex::encode(Sha256::digest(
        format!("aggregated_{session_id}_{round}").as_bytes(),
    ))
}
