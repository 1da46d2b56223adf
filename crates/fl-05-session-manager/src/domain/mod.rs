//! # Domain Layer
//!
//! Session requests and the lifecycle transitions. Every transition is a pure
//! `(session, command) -> (session, event)` function; the service loads and
//! stores the records around it.

use serde::{Deserialize, Serialize};
use shared_bus::FederationEvent;
use shared_types::{
    validate_component, AgreementInfo, AgreementStatus, AggregationMethod, EntityKind, FinalStats,
    FlError, FlSession, OrgId, SessionId, SessionStatus, StateConflict, Timestamp,
    MAX_PARTICIPANTS, TARGET_METRIC_ACCURACY,
};
use std::collections::HashSet;

pub const DEFAULT_MIN_PARTICIPANTS: usize = 2;
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_TARGET_VALUE: f64 = 0.95;
pub const DEFAULT_COMPLETION_REASON: &str = "Manual completion";

/// Parameters of a new session. Optional fields fall back to the defaults
/// above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub session_name: String,
    pub agreement_id: String,
    pub model_type: String,
    #[serde(default)]
    pub model_architecture: serde_json::Value,
    pub max_rounds: u32,
    pub privacy_epsilon: f64,
    #[serde(default)]
    pub participants: Vec<OrgId>,
    #[serde(default)]
    pub min_participants: Option<usize>,
    #[serde(default)]
    pub aggregation_method: Option<AggregationMethod>,
    #[serde(default)]
    pub learning_rate: Option<f64>,
    #[serde(default)]
    pub target_metric: Option<String>,
    #[serde(default)]
    pub target_value: Option<f64>,
}

impl CreateSessionRequest {
    /// Request with the required fields and no participants.
    pub fn new(
        session_name: impl Into<String>,
        agreement_id: impl Into<String>,
        model_type: impl Into<String>,
        max_rounds: u32,
        privacy_epsilon: f64,
    ) -> Self {
        Self {
            session_name: session_name.into(),
            agreement_id: agreement_id.into(),
            model_type: model_type.into(),
            model_architecture: serde_json::Value::Null,
            max_rounds,
            privacy_epsilon,
            participants: Vec::new(),
            min_participants: None,
            aggregation_method: None,
            learning_rate: None,
            target_metric: None,
            target_value: None,
        }
    }

    #[must_use]
    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OrgId>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_min_participants(mut self, min: usize) -> Self {
        self.min_participants = Some(min);
        self
    }

    #[must_use]
    pub fn with_target(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.target_metric = Some(metric.into());
        self.target_value = Some(value);
        self
    }

    pub fn validate(&self) -> Result<(), FlError> {
        require_text("session_name", &self.session_name)?;
        require_text("model_type", &self.model_type)?;
        validate_component("agreement_id", &self.agreement_id)?;
        if self.max_rounds == 0 {
            return Err(FlError::validation("max_rounds", "must be at least 1"));
        }
        if !self.privacy_epsilon.is_finite() || self.privacy_epsilon <= 0.0 {
            return Err(FlError::validation(
                "privacy_epsilon",
                "must be a finite, positive number",
            ));
        }

        if self.participants.len() > MAX_PARTICIPANTS {
            return Err(FlError::validation(
                "participants",
                format!("at most {MAX_PARTICIPANTS} participants"),
            ));
        }
        let mut seen = HashSet::new();
        for org in &self.participants {
            validate_component("participants", org)?;
            if !seen.insert(org.as_str()) {
                return Err(FlError::validation(
                    "participants",
                    format!("{org} is listed twice"),
                ));
            }
        }

        if let Some(min) = self.min_participants {
            if !(1..=MAX_PARTICIPANTS).contains(&min) {
                return Err(FlError::validation(
                    "min_participants",
                    format!("must be between 1 and {MAX_PARTICIPANTS}"),
                ));
            }
        }
        if let Some(lr) = self.learning_rate {
            if !lr.is_finite() || lr <= 0.0 {
                return Err(FlError::validation(
                    "learning_rate",
                    "must be a finite, positive number",
                ));
            }
        }
        if let Some(metric) = &self.target_metric {
            require_text("target_metric", metric)?;
        }
        if let Some(value) = self.target_value {
            if !value.is_finite() {
                return Err(FlError::validation("target_value", "must be finite"));
            }
        }
        Ok(())
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), FlError> {
    if value.trim().is_empty() {
        return Err(FlError::validation(field, "is required"));
    }
    Ok(())
}

/// Build the initial record for a validated request.
#[must_use]
pub fn new_session(
    session_id: SessionId,
    created_by: OrgId,
    request: CreateSessionRequest,
    now: Timestamp,
) -> (FlSession, FederationEvent) {
    let session = FlSession {
        session_id,
        session_name: request.session_name,
        agreement_id: request.agreement_id,
        model_type: request.model_type,
        model_architecture: request.model_architecture,
        participants: request.participants,
        current_round: 0,
        max_rounds: request.max_rounds,
        privacy_epsilon: request.privacy_epsilon,
        min_participants: request.min_participants.unwrap_or(DEFAULT_MIN_PARTICIPANTS),
        aggregation_method: request.aggregation_method.unwrap_or_default(),
        learning_rate: request.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
        target_metric: request
            .target_metric
            .unwrap_or_else(|| TARGET_METRIC_ACCURACY.to_string()),
        target_value: request.target_value.unwrap_or(DEFAULT_TARGET_VALUE),
        status: SessionStatus::Initialized,
        created_by,
        created_at: now,
        started_at: None,
        completed_at: None,
        total_updates_received: 0,
        anomalies_detected: 0,
        current_accuracy: None,
        best_accuracy: None,
        best_round: None,
        failure_reason: None,
        completion_reason: None,
        final_metrics: None,
        final_stats: None,
    };
    let event = FederationEvent::SessionCreated {
        session_id: session.session_id.clone(),
        session_name: session.session_name.clone(),
        created_by: session.created_by.clone(),
        participants: session.participants.clone(),
    };
    (session, event)
}

fn require_initialized(session: &FlSession) -> Result<(), FlError> {
    if session.status != SessionStatus::Initialized {
        return Err(StateConflict::WrongStatus {
            expected: SessionStatus::Initialized,
            actual: session.status,
        }
        .into());
    }
    Ok(())
}

/// `Initialized -> Active`, opening round 1.
pub fn start(
    mut session: FlSession,
    now: Timestamp,
) -> Result<(FlSession, FederationEvent), FlError> {
    require_initialized(&session)?;
    if session.participants.len() < session.min_participants {
        return Err(StateConflict::InsufficientParticipants {
            have: session.participants.len(),
            need: session.min_participants,
        }
        .into());
    }

    session.status = SessionStatus::Active;
    session.current_round = 1;
    session.started_at = Some(now);

    let event = FederationEvent::SessionStarted {
        session_id: session.session_id.clone(),
        participants: session.participants.clone(),
        current_round: session.current_round,
    };
    Ok((session, event))
}

/// Append `org` to an initialized session with an open seat.
pub fn join(mut session: FlSession, org: &str) -> Result<(FlSession, FederationEvent), FlError> {
    require_initialized(&session)?;
    if session.is_participant(org) {
        return Err(StateConflict::AlreadyJoined {
            org: org.to_string(),
        }
        .into());
    }
    if session.open_seats() == 0 {
        return Err(StateConflict::ParticipantLimit {
            limit: MAX_PARTICIPANTS,
        }
        .into());
    }

    session.participants.push(org.to_string());
    let event = FederationEvent::ParticipantJoined {
        session_id: session.session_id.clone(),
        org_id: org.to_string(),
        total_participants: session.participants.len(),
    };
    Ok((session, event))
}

/// Snapshot of a session at manual completion.
#[must_use]
pub fn final_stats(session: &FlSession) -> FinalStats {
    FinalStats {
        total_rounds: session.current_round,
        final_accuracy: session.current_accuracy.unwrap_or(0.0),
        best_accuracy: session.best_accuracy.unwrap_or(0.0),
        best_round: session.best_round.unwrap_or(0),
        total_updates: session.total_updates_received,
        anomalies_detected: session.anomalies_detected,
        completion_rate: f64::from(session.current_round) / f64::from(session.max_rounds) * 100.0,
    }
}

/// Manual completion from any non-terminal status.
pub fn complete(
    mut session: FlSession,
    reason: Option<String>,
    now: Timestamp,
) -> Result<(FlSession, FederationEvent), FlError> {
    if session.status.is_terminal() {
        return Err(StateConflict::AlreadyTerminal {
            status: session.status,
        }
        .into());
    }

    let reason = reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_COMPLETION_REASON.to_string());

    session.final_stats = Some(final_stats(&session));
    session.status = SessionStatus::Completed;
    session.completed_at = Some(now);
    session.completion_reason = Some(reason.clone());

    let event = FederationEvent::SessionCompleted {
        session_id: session.session_id.clone(),
        completion_reason: reason,
        total_rounds: session.current_round,
    };
    Ok((session, event))
}

/// Agreement admission for `orgs`.
///
/// With `enforce_partnership` off only existence is required of the lookup
/// result; status and partner lists are ignored.
pub fn check_agreement(
    agreement_id: &str,
    agreement: Option<&AgreementInfo>,
    orgs: &[&str],
    enforce_partnership: bool,
) -> Result<(), FlError> {
    let agreement =
        agreement.ok_or_else(|| FlError::not_found(EntityKind::Agreement, agreement_id))?;
    if !enforce_partnership {
        return Ok(());
    }
    if agreement.status != AgreementStatus::Active {
        return Err(StateConflict::InactiveAgreement {
            agreement_id: agreement_id.to_string(),
        }
        .into());
    }
    if let Some(outsider) = orgs.iter().find(|org| !agreement.is_partner(org)) {
        return Err(FlError::unauthorized(
            *outsider,
            format!("not a partner of agreement {agreement_id}"),
        ));
    }
    Ok(())
}
