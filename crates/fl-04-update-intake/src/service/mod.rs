//! # Update Intake Service

use crate::domain::{build_record, check_admissible, SubmitModelUpdateRequest};
use fl_01_ledger::{LedgerStore, LedgerTransaction};
use fl_02_privacy_budget::PrivacyBudgetLedger;
use fl_03_aggregation::{Aggregator, RoundOutcome};
use shared_bus::{EventPublisher, FederationEvent};
use shared_types::{
    CallContext, EntityKind, FlError, FlSession, IdentityResolver, KeyPrefix, Round,
    SessionStatus, StateConflict, TimeSource,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the submitter learns about its update.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub update_id: String,
    pub anomaly_score: f64,
    pub is_valid: bool,
    /// Set when this submission closed the round.
    pub round_closed: Option<RoundClosed>,
}

/// Summary of the round this submission closed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundClosed {
    pub round: Round,
    pub status: SessionStatus,
    pub next_round: Round,
    pub aggregated: bool,
}

/// Sole writer of `update:` records.
pub struct UpdateIntake {
    ledger: Arc<dyn LedgerStore>,
    budgets: Arc<PrivacyBudgetLedger>,
    aggregator: Arc<Aggregator>,
    identity: Arc<dyn IdentityResolver>,
    publisher: Arc<dyn EventPublisher>,
    time: Arc<dyn TimeSource>,
}

impl UpdateIntake {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        budgets: Arc<PrivacyBudgetLedger>,
        aggregator: Arc<Aggregator>,
        identity: Arc<dyn IdentityResolver>,
        publisher: Arc<dyn EventPublisher>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            ledger,
            budgets,
            aggregator,
            identity,
            publisher,
            time,
        }
    }

    /// Admit one update. Runs as a single transaction; events are published
    /// only after it commits.
    pub fn submit_model_update(
        &self,
        ctx: &CallContext,
        request: SubmitModelUpdateRequest,
    ) -> Result<SubmissionReceipt, FlError> {
        request.validate()?;

        let caller = self.identity.resolve(ctx)?;
        if caller != request.org_id {
            return Err(FlError::unauthorized(
                caller,
                format!("cannot submit on behalf of {}", request.org_id),
            ));
        }

        let mut tx = LedgerTransaction::begin(self.ledger.as_ref());
        let (receipt, events) = self.admit(&mut tx, &request).map_err(|e| {
            warn!(
                "[fl-04] Rejected update from {} for {} round {}: {}",
                request.org_id, request.session_id, request.round, e
            );
            e
        })?;
        tx.commit()?;

        info!(
            "[fl-04] Update {} accepted from {} (round {}, score {:.3}, valid {})",
            receipt.update_id,
            request.org_id,
            request.round,
            receipt.anomaly_score,
            receipt.is_valid
        );

        for event in events {
            self.publisher.publish(event);
        }
        Ok(receipt)
    }

    fn admit(
        &self,
        tx: &mut LedgerTransaction<'_>,
        request: &SubmitModelUpdateRequest,
    ) -> Result<(SubmissionReceipt, Vec<FederationEvent>), FlError> {
        let session_key = KeyPrefix::session_key(&request.session_id);
        let mut session: FlSession = tx
            .get_json(&session_key)?
            .ok_or_else(|| FlError::not_found(EntityKind::Session, &request.session_id))?;

        check_admissible(&session, &request.org_id, request.round)?;

        let update_key = KeyPrefix::update_key(&request.session_id, request.round, &request.org_id);
        if tx.exists(&update_key)? {
            return Err(StateConflict::DuplicateSubmission {
                org: request.org_id.clone(),
                round: request.round,
            }
            .into());
        }

        self.budgets.check_and_reserve(
            tx,
            &request.org_id,
            &request.session_id,
            request.privacy_budget_used,
        )?;

        let record = build_record(request, self.time.now());
        tx.put_json(update_key, &record)?;

        session.total_updates_received += 1;
        if !record.is_valid {
            session.anomalies_detected += 1;
            debug!(
                "[fl-04] Update {} flagged anomalous (score {:.3})",
                record.update_id, record.anomaly_score
            );
        }

        let mut events = Vec::with_capacity(2);
        let round_updates = self.aggregator.collect_round(tx, &session)?;
        let round_closed = if self.aggregator.round_complete(&session, &round_updates) {
            let RoundOutcome {
                session: closed,
                aggregation,
                event,
            } = self.aggregator.close_round(tx, session, &round_updates)?;
            events.push(event);
            Some(RoundClosed {
                round: request.round,
                status: closed.status,
                next_round: closed.current_round,
                aggregated: aggregation.is_some(),
            })
        } else {
            debug!(
                "[fl-04] Round {} of {}: {}/{} submitted",
                request.round,
                request.session_id,
                round_updates.len(),
                session.participants.len()
            );
            tx.put_json(session_key, &session)?;
            None
        };

        events.push(FederationEvent::ModelUpdateSubmitted {
            update_id: record.update_id.clone(),
            session_id: record.session_id.clone(),
            org_id: record.org_id.clone(),
            round: record.round,
            is_valid: record.is_valid,
        });

        Ok((
            SubmissionReceipt {
                update_id: record.update_id,
                anomaly_score: record.anomaly_score,
                is_valid: record.is_valid,
                round_closed,
            },
            events,
        ))
    }
}
