//! # Domain Layer
//!
//! Request validation, admissibility rules and anomaly scoring.

use serde::{Deserialize, Serialize};
use shared_types::{
    derive_update_id, validate_component, FlError, FlSession, ModelUpdateRecord, OrgId, Round,
    SessionId, SessionStatus, StateConflict, Timestamp, UpdateMetrics, ANOMALY_THRESHOLD,
};

/// Score given to updates whose metrics are out of range.
pub const OUT_OF_RANGE_SCORE: f64 = 0.9;

/// Highest plausible loss.
pub const MAX_PLAUSIBLE_LOSS: f64 = 10.0;

/// A participant's submission for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitModelUpdateRequest {
    pub session_id: SessionId,
    pub org_id: OrgId,
    pub round: Round,
    pub update_hash: String,
    pub privacy_budget_used: f64,
    /// Updates without metrics score 0; an empty metrics object is scored.
    #[serde(default)]
    pub metrics: Option<UpdateMetrics>,
    #[serde(default)]
    pub computation_time: Option<f64>,
    #[serde(default)]
    pub samples_used: Option<u64>,
}

impl SubmitModelUpdateRequest {
    pub fn validate(&self) -> Result<(), FlError> {
        validate_component("session_id", &self.session_id)?;
        validate_component("org_id", &self.org_id)?;
        if self.update_hash.trim().is_empty() {
            return Err(FlError::validation("update_hash", "must not be empty"));
        }
        if !self.privacy_budget_used.is_finite() || self.privacy_budget_used < 0.0 {
            return Err(FlError::validation(
                "privacy_budget_used",
                "must be a finite, non-negative number",
            ));
        }
        Ok(())
    }
}

/// Anomaly score in `[0, 1]`, a pure function of the declared metrics.
///
/// Out-of-range loss (outside `[0, 10]`) or accuracy (outside `[0, 1]`)
/// scores 0.9. Otherwise each metric contributes up to 0.5, a missing metric
/// contributing the full 0.5.
#[must_use]
pub fn anomaly_score(metrics: &UpdateMetrics) -> f64 {
    if let Some(loss) = metrics.loss {
        if !loss.is_finite() || !(0.0..=MAX_PLAUSIBLE_LOSS).contains(&loss) {
            return OUT_OF_RANGE_SCORE;
        }
    }
    if let Some(accuracy) = metrics.accuracy {
        if !accuracy.is_finite() || !(0.0..=1.0).contains(&accuracy) {
            return OUT_OF_RANGE_SCORE;
        }
    }

    let accuracy_score = metrics.accuracy.map_or(0.5, |a| (1.0 - a) * 0.5);
    let loss_score = metrics
        .loss
        .map_or(0.5, |l| (l / MAX_PLAUSIBLE_LOSS).min(1.0) * 0.5);
    accuracy_score + loss_score
}

#[must_use]
pub fn is_valid_score(score: f64) -> bool {
    score < ANOMALY_THRESHOLD
}

/// Status, round and membership checks for `org` submitting `round`.
pub fn check_admissible(session: &FlSession, org: &str, round: Round) -> Result<(), FlError> {
    if session.status != SessionStatus::Active {
        return Err(StateConflict::WrongStatus {
            expected: SessionStatus::Active,
            actual: session.status,
        }
        .into());
    }
    if round != session.current_round {
        return Err(StateConflict::RoundMismatch {
            submitted: round,
            current: session.current_round,
        }
        .into());
    }
    if !session.is_participant(org) {
        return Err(StateConflict::NotParticipant {
            org: org.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Score of a submission. Only declared metrics can make an update anomalous.
#[must_use]
pub fn submission_score(metrics: Option<&UpdateMetrics>) -> f64 {
    metrics.map_or(0.0, anomaly_score)
}

/// Build the stored record for an admitted request.
#[must_use]
pub fn build_record(request: &SubmitModelUpdateRequest, now: Timestamp) -> ModelUpdateRecord {
    let score = submission_score(request.metrics.as_ref());
    let metrics = request.metrics.unwrap_or_default();
    ModelUpdateRecord {
        update_id: derive_update_id(&request.session_id, request.round, &request.org_id),
        session_id: request.session_id.clone(),
        org_id: request.org_id.clone(),
        round: request.round,
        update_hash: request.update_hash.clone(),
        privacy_budget_used: request.privacy_budget_used,
        submitted_at: now,
        anomaly_score: score,
        is_valid: is_valid_score(score),
        metrics,
        computation_time: request.computation_time,
        samples_used: request.samples_used,
    }
}
