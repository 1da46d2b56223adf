//! # Domain Layer
//!
//! Report shapes and the folds that build them. No I/O.

use serde::{Deserialize, Serialize};
use shared_types::{
    validate_component, AggregationRecord, AnomalyFlag, FlError, FlSession, FlagSeverity,
    ModelUpdateRecord, OrgId, PrivacyBudgetRecord, Round, SessionId, SessionStatus, Timestamp,
    UpdateMetrics,
};
use std::collections::BTreeMap;

/// `part / whole * 100`, or 0 for an empty whole.
#[must_use]
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Newest first by creation time. Stable, so ties keep scan order.
pub fn sort_newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> Timestamp) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

// =============================================================================
// SESSION DETAILS / MODEL HISTORY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub org_id: OrgId,
    pub submitted_at: Timestamp,
    pub is_valid: bool,
    pub anomaly_score: f64,
    pub metrics: UpdateMetrics,
}

impl From<&ModelUpdateRecord> for UpdateSummary {
    fn from(u: &ModelUpdateRecord) -> Self {
        Self {
            org_id: u.org_id.clone(),
            submitted_at: u.submitted_at,
            is_valid: u.is_valid,
            anomaly_score: u.anomaly_score,
            metrics: u.metrics,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundDetails {
    pub updates: Vec<UpdateSummary>,
    pub aggregation: Option<AggregationRecord>,
}

/// A session with its per-round activity for rounds `1..=current_round`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    #[serde(flatten)]
    pub session: FlSession,
    pub round_updates: BTreeMap<Round, RoundDetails>,
}

impl SessionDetails {
    pub fn new(session: FlSession) -> Self {
        let round_updates = (1..=session.current_round)
            .map(|r| (r, RoundDetails::default()))
            .collect();
        Self {
            session,
            round_updates,
        }
    }

    /// Records outside `1..=current_round` are ignored.
    pub fn add_update(&mut self, update: &ModelUpdateRecord) {
        if let Some(round) = self.round_updates.get_mut(&update.round) {
            round.updates.push(update.into());
        }
    }

    pub fn add_aggregation(&mut self, aggregation: AggregationRecord) {
        if let Some(round) = self.round_updates.get_mut(&aggregation.round) {
            round.aggregation = Some(aggregation);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalUpdate {
    pub org_id: OrgId,
    pub update_hash: String,
    pub submitted_at: Timestamp,
    pub is_valid: bool,
    pub metrics: UpdateMetrics,
    pub privacy_budget_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHistoryRound {
    pub round: Round,
    pub updates: Vec<HistoricalUpdate>,
    pub aggregation: Option<AggregationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHistory {
    pub session_id: SessionId,
    pub session_name: String,
    pub model_type: String,
    pub rounds: Vec<ModelHistoryRound>,
}

impl ModelHistory {
    pub fn new(session: &FlSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            session_name: session.session_name.clone(),
            model_type: session.model_type.clone(),
            rounds: (1..=session.current_round)
                .map(|round| ModelHistoryRound {
                    round,
                    updates: Vec::new(),
                    aggregation: None,
                })
                .collect(),
        }
    }

    fn round_mut(&mut self, round: Round) -> Option<&mut ModelHistoryRound> {
        let index = usize::try_from(round).ok()?.checked_sub(1)?;
        self.rounds.get_mut(index)
    }

    pub fn add_update(&mut self, u: &ModelUpdateRecord) {
        if let Some(round) = self.round_mut(u.round) {
            round.updates.push(HistoricalUpdate {
                org_id: u.org_id.clone(),
                update_hash: u.update_hash.clone(),
                submitted_at: u.submitted_at,
                is_valid: u.is_valid,
                metrics: u.metrics,
                privacy_budget_used: u.privacy_budget_used,
            });
        }
    }

    pub fn add_aggregation(&mut self, aggregation: AggregationRecord) {
        if let Some(round) = self.round_mut(aggregation.round) {
            round.aggregation = Some(aggregation);
        }
    }
}

// =============================================================================
// PROGRESS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundHistoryEntry {
    pub round: Round,
    pub accuracy: f64,
    pub loss: f64,
    pub participants: usize,
    pub timestamp: Timestamp,
}

impl From<&AggregationRecord> for RoundHistoryEntry {
    fn from(a: &AggregationRecord) -> Self {
        Self {
            round: a.round,
            accuracy: a.metrics.accuracy,
            loss: a.metrics.loss,
            participants: a.participants_count,
            timestamp: a.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub session_id: SessionId,
    pub session_name: String,
    pub status: SessionStatus,
    pub current_round: Round,
    pub max_rounds: Round,
    pub progress_percentage: f64,
    pub current_accuracy: Option<f64>,
    pub target_accuracy: f64,
    pub accuracy_progress: f64,
    pub participants: usize,
    pub total_updates_received: u64,
    pub anomalies_detected: u64,
    pub started_at: Option<Timestamp>,
    pub estimated_completion: Option<Timestamp>,
    pub round_history: Vec<RoundHistoryEntry>,
}

/// Projected completion time of an active session.
///
/// Average duration of the completed rounds times the rounds still to run,
/// counting the current one. `None` until at least one round has closed.
#[must_use]
pub fn estimated_completion(session: &FlSession, now: Timestamp) -> Option<Timestamp> {
    if session.status != SessionStatus::Active {
        return None;
    }
    let started_at = session.started_at?;
    let rounds_completed = session.current_round.saturating_sub(1);
    if rounds_completed == 0 {
        return None;
    }

    let elapsed = now.saturating_sub(started_at) as f64;
    let per_round = elapsed / f64::from(rounds_completed);
    let remaining = session.max_rounds.saturating_sub(session.current_round) + 1;
    Some(now + (per_round * f64::from(remaining)).round() as u64)
}

/// Progress of `session`, given its aggregation records in round order.
#[must_use]
pub fn session_progress(
    session: &FlSession,
    aggregations: &[AggregationRecord],
    now: Timestamp,
) -> SessionProgress {
    let accuracy_progress = match session.current_accuracy {
        Some(acc) if acc != 0.0 => percentage(acc, session.target_value),
        _ => 0.0,
    };
    SessionProgress {
        session_id: session.session_id.clone(),
        session_name: session.session_name.clone(),
        status: session.status,
        current_round: session.current_round,
        max_rounds: session.max_rounds,
        progress_percentage: percentage(
            f64::from(session.current_round),
            f64::from(session.max_rounds),
        ),
        current_accuracy: session.current_accuracy,
        target_accuracy: session.target_value,
        accuracy_progress,
        participants: session.participants.len(),
        total_updates_received: session.total_updates_received,
        anomalies_detected: session.anomalies_detected,
        started_at: session.started_at,
        estimated_completion: estimated_completion(session, now),
        round_history: aggregations
            .iter()
            .filter(|a| a.round >= 1 && a.round <= session.current_round)
            .map(RoundHistoryEntry::from)
            .collect(),
    }
}

// =============================================================================
// PRIVACY BUDGETS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total_allocated: f64,
    pub total_used: f64,
    pub total_remaining: f64,
    pub usage_percentage: f64,
}

impl BudgetSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PrivacyBudgetRecord>) -> Self {
        let (allocated, used) = records
            .into_iter()
            .fold((0.0, 0.0), |(a, u), b| (a + b.total_budget, u + b.used()));
        Self {
            total_allocated: allocated,
            total_used: used,
            total_remaining: allocated - used,
            usage_percentage: percentage(used, allocated),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyBudgetStatus {
    pub org_id: OrgId,
    pub budgets: Vec<PrivacyBudgetRecord>,
    pub summary: BudgetSummary,
    pub timestamp: Timestamp,
}

impl PrivacyBudgetStatus {
    pub fn new(org_id: OrgId, budgets: Vec<PrivacyBudgetRecord>, now: Timestamp) -> Self {
        let summary = BudgetSummary::from_records(&budgets);
        Self {
            org_id,
            budgets,
            summary,
            timestamp: now,
        }
    }
}

/// An organization's spend in one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetUsage {
    pub used: f64,
    pub remaining: f64,
    pub total: f64,
}

impl From<&PrivacyBudgetRecord> for BudgetUsage {
    fn from(b: &PrivacyBudgetRecord) -> Self {
        Self {
            used: b.used(),
            remaining: b.remaining_budget,
            total: b.total_budget,
        }
    }
}

// =============================================================================
// SESSION LISTINGS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MySession {
    #[serde(flatten)]
    pub session: FlSession,
    pub my_privacy_budget: Option<BudgetUsage>,
}

/// An initialized session with an open seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSession {
    pub session_id: SessionId,
    pub session_name: String,
    pub model_type: String,
    pub participants: Vec<OrgId>,
    pub spots_available: usize,
    pub max_rounds: Round,
    pub privacy_epsilon: f64,
    pub created_at: Timestamp,
    pub created_by: OrgId,
}

impl AvailableSession {
    /// `Some` if `org` could join `session` right now.
    #[must_use]
    pub fn offer(session: &FlSession, org: &str) -> Option<Self> {
        let open = session.status == SessionStatus::Initialized
            && !session.is_participant(org)
            && session.open_seats() > 0;
        open.then(|| Self {
            session_id: session.session_id.clone(),
            session_name: session.session_name.clone(),
            model_type: session.model_type.clone(),
            participants: session.participants.clone(),
            spots_available: session.open_seats(),
            max_rounds: session.max_rounds,
            privacy_epsilon: session.privacy_epsilon,
            created_at: session.created_at,
            created_by: session.created_by.clone(),
        })
    }
}

// =============================================================================
// AGGREGATE STATISTICS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub completed_sessions: u64,
    pub failed_sessions: u64,
    pub total_updates: u64,
    pub total_anomalies: u64,
    pub anomaly_rate: f64,
    /// Session budgets only; global budgets are not spent by training.
    pub total_privacy_budget_used: f64,
    pub timestamp: Timestamp,
}

impl SystemStats {
    pub fn record_session(&mut self, session: &FlSession) {
        self.total_sessions += 1;
        match session.status {
            SessionStatus::Active => self.active_sessions += 1,
            SessionStatus::Completed => self.completed_sessions += 1,
            SessionStatus::Failed => self.failed_sessions += 1,
            SessionStatus::Initialized => {}
        }
        self.total_updates += session.total_updates_received;
        self.total_anomalies += session.anomalies_detected;
    }

    pub fn record_budget(&mut self, budget: &PrivacyBudgetRecord) {
        if budget.is_session_budget() {
            self.total_privacy_budget_used += budget.used();
        }
    }

    #[must_use]
    pub fn finish(mut self, now: Timestamp) -> Self {
        self.anomaly_rate = percentage(self.total_anomalies as f64, self.total_updates as f64);
        self.timestamp = now;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCounts {
    pub total: u64,
    pub active: u64,
    pub completed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateCounts {
    pub total: u64,
    pub valid: u64,
    pub anomalous: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetTotals {
    pub total_allocated: f64,
    pub total_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPerformance {
    pub org_id: OrgId,
    pub sessions: SessionCounts,
    pub updates: UpdateCounts,
    pub privacy_budget: BudgetTotals,
    /// Mean final accuracy over completed sessions that reported one.
    pub average_accuracy: f64,
    pub best_accuracy: f64,
    /// Share of the org's updates that were valid.
    pub participation_rate: f64,
    pub timestamp: Timestamp,
    #[serde(skip)]
    accuracy_sum: f64,
    #[serde(skip)]
    accuracy_count: u64,
}

impl OrganizationPerformance {
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            sessions: SessionCounts::default(),
            updates: UpdateCounts::default(),
            privacy_budget: BudgetTotals::default(),
            average_accuracy: 0.0,
            best_accuracy: 0.0,
            participation_rate: 0.0,
            timestamp: 0,
            accuracy_sum: 0.0,
            accuracy_count: 0,
        }
    }

    /// Count a session the org participates in.
    pub fn record_session(&mut self, session: &FlSession) {
        self.sessions.total += 1;
        match session.status {
            SessionStatus::Active => self.sessions.active += 1,
            SessionStatus::Completed => {
                self.sessions.completed += 1;
                if let Some(acc) = session.current_accuracy.filter(|a| *a != 0.0) {
                    self.accuracy_sum += acc;
                    self.accuracy_count += 1;
                    if acc > self.best_accuracy {
                        self.best_accuracy = acc;
                    }
                }
            }
            SessionStatus::Initialized | SessionStatus::Failed => {}
        }
    }

    pub fn record_update(&mut self, update: &ModelUpdateRecord) {
        self.updates.total += 1;
        if update.is_valid {
            self.updates.valid += 1;
        } else {
            self.updates.anomalous += 1;
        }
    }

    pub fn record_budget(&mut self, budget: &PrivacyBudgetRecord) {
        if budget.org_id == self.org_id && budget.is_session_budget() {
            self.privacy_budget.total_allocated += budget.total_budget;
            self.privacy_budget.total_used += budget.used();
        }
    }

    #[must_use]
    pub fn finish(mut self, now: Timestamp) -> Self {
        if self.accuracy_count > 0 {
            self.average_accuracy = self.accuracy_sum / self.accuracy_count as f64;
        }
        self.participation_rate =
            percentage(self.updates.valid as f64, self.updates.total as f64);
        self.timestamp = now;
        self
    }
}

// =============================================================================
// ANOMALY FLAGS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRequest {
    pub reason: String,
    #[serde(default)]
    pub severity: Option<FlagSeverity>,
    #[serde(default)]
    pub evidence: Option<serde_json::Value>,
}

impl FlagRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            severity: None,
            evidence: None,
        }
    }

    pub fn validate(&self) -> Result<(), FlError> {
        if self.reason.trim().is_empty() {
            return Err(FlError::validation("reason", "is required"));
        }
        Ok(())
    }
}

/// `FLAG-<update_id>-<nonce>`.
#[must_use]
pub fn flag_id(update_id: &str, nonce: &str) -> String {
    format!("FLAG-{update_id}-{nonce}")
}

pub fn build_flag(
    update_id: &str,
    reported_by: OrgId,
    request: FlagRequest,
    flag_id: String,
    now: Timestamp,
) -> Result<AnomalyFlag, FlError> {
    validate_component("update_id", update_id)?;
    request.validate()?;
    Ok(AnomalyFlag {
        flag_id,
        update_id: update_id.to_string(),
        reason: request.reason,
        reported_by,
        severity: request.severity.unwrap_or_default(),
        timestamp: now,
        evidence: request
            .evidence
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
    })
}
