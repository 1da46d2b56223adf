//! # Domain Layer
//!
//! Pure round-closing logic: `(session, round updates) -> (session, record, event)`.

use shared_bus::FederationEvent;
use shared_types::{
    aggregated_model_hash, AggregatedMetrics, AggregationRecord, FlSession, ModelUpdateRecord,
    SessionStatus, Timestamp, TARGET_METRIC_ACCURACY,
};

/// Completeness check for a round.
pub struct RoundBarrier;

impl RoundBarrier {
    /// A round closes when every declared participant has a record, valid or not.
    #[must_use]
    pub fn is_complete(session: &FlSession, submitted: usize) -> bool {
        !session.participants.is_empty() && submitted == session.participants.len()
    }
}

/// Result of closing a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub session: FlSession,
    /// `None` when the session failed for lack of valid updates.
    pub aggregation: Option<AggregationRecord>,
    pub event: FederationEvent,
}

/// Mean accuracy and loss over the updates that report each metric.
///
/// Each metric has its own denominator; a metric nobody reports averages to 0.
#[must_use]
pub fn aggregate_metrics(updates: &[&ModelUpdateRecord]) -> AggregatedMetrics {
    fn mean(values: impl Iterator<Item = f64>) -> f64 {
        let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    AggregatedMetrics {
        accuracy: mean(updates.iter().filter_map(|u| u.metrics.accuracy)),
        loss: mean(updates.iter().filter_map(|u| u.metrics.loss)),
        participants_count: updates.len(),
    }
}

/// Close `round` of `session` given all of its update records.
#[must_use]
pub fn close_round(
    mut session: FlSession,
    updates: &[ModelUpdateRecord],
    now: Timestamp,
) -> RoundOutcome {
    let round = session.current_round;
    let valid: Vec<&ModelUpdateRecord> = updates.iter().filter(|u| u.is_valid).collect();

    if valid.len() < session.min_participants {
        session.status = SessionStatus::Failed;
        session.failure_reason = Some(format!(
            "Insufficient valid updates in round {round}: {} of {} required",
            valid.len(),
            session.min_participants
        ));
        session.completed_at = Some(now);

        let event = FederationEvent::AggregationCompleted {
            session_id: session.session_id.clone(),
            round,
            next_round: round,
            status: session.status,
            current_accuracy: session.current_accuracy,
        };
        return RoundOutcome {
            session,
            aggregation: None,
            event,
        };
    }

    let metrics = aggregate_metrics(&valid);
    let record = AggregationRecord {
        session_id: session.session_id.clone(),
        round,
        method: session.aggregation_method,
        participants_count: valid.len(),
        timestamp: now,
        aggregated_model_hash: aggregated_model_hash(&session.session_id, round),
        metrics,
    };

    session.current_accuracy = Some(metrics.accuracy);
    if session
        .best_accuracy
        .map_or(true, |best| metrics.accuracy > best)
    {
        session.best_accuracy = Some(metrics.accuracy);
        session.best_round = Some(round);
    }

    let target_reached =
        session.target_metric == TARGET_METRIC_ACCURACY && metrics.accuracy >= session.target_value;

    if round >= session.max_rounds || target_reached {
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        session.final_metrics = Some(metrics);
        session.completion_reason = Some(if target_reached {
            format!("Target {} {} reached", session.target_metric, session.target_value)
        } else {
            "Maximum rounds reached".to_string()
        });
    } else {
        session.current_round += 1;
    }

    let event = FederationEvent::AggregationCompleted {
        session_id: session.session_id.clone(),
        round,
        next_round: session.current_round,
        status: session.status,
        current_accuracy: session.current_accuracy,
    };

    RoundOutcome {
        session,
        aggregation: Some(record),
        event,
    }
}
