//! # Aggregation Service
//!
//! Runs inside the submitting call's transaction. Loads the round's update
//! records, closes the round and buffers the session and aggregation writes.

use crate::domain::{close_round, RoundBarrier, RoundOutcome};
use fl_01_ledger::LedgerTransaction;
use shared_types::{FlError, FlSession, KeyPrefix, ModelUpdateRecord, TimeSource};
use std::sync::Arc;
use tracing::{info, warn};

/// Sole writer of `aggregation:` records.
pub struct Aggregator {
    time: Arc<dyn TimeSource>,
}

impl Aggregator {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self { time }
    }

    /// Update records of the session's current round, one point read per
    /// declared participant so each key lands in the read set.
    pub fn collect_round(
        &self,
        tx: &mut LedgerTransaction<'_>,
        session: &FlSession,
    ) -> Result<Vec<ModelUpdateRecord>, FlError> {
        let mut updates = Vec::with_capacity(session.participants.len());
        for org in &session.participants {
            let key = KeyPrefix::update_key(&session.session_id, session.current_round, org);
            if let Some(update) = tx.get_json::<ModelUpdateRecord>(&key)? {
                updates.push(update);
            }
        }
        Ok(updates)
    }

    /// Whether `updates` closes the round.
    #[must_use]
    pub fn round_complete(&self, session: &FlSession, updates: &[ModelUpdateRecord]) -> bool {
        RoundBarrier::is_complete(session, updates.len())
    }

    /// Close the current round and buffer the session (and aggregation) writes.
    pub fn close_round(
        &self,
        tx: &mut LedgerTransaction<'_>,
        session: FlSession,
        updates: &[ModelUpdateRecord],
    ) -> Result<RoundOutcome, FlError> {
        let session_id = session.session_id.clone();
        let round = session.current_round;

        let agg_key = KeyPrefix::aggregation_key(&session_id, round);
        if tx.exists(&agg_key)? {
            return Err(FlError::Storage(format!(
                "aggregation for {session_id} round {round} already recorded"
            )));
        }

        let outcome = close_round(session, updates, self.time.now());

        if let Some(record) = &outcome.aggregation {
            tx.put_json(agg_key, record)?;
            info!(
                "[fl-03] Round {} of {} aggregated: {} valid, accuracy {:.4}, status {}",
                round,
                session_id,
                record.participants_count,
                record.metrics.accuracy,
                outcome.session.status
            );
        } else {
            warn!(
                "[fl-03] Session {} failed in round {}: {}",
                session_id,
                round,
                outcome.session.failure_reason.as_deref().unwrap_or("")
            );
        }

        tx.put_json(KeyPrefix::session_key(&session_id), &outcome.session)?;
        Ok(outcome)
    }
}
