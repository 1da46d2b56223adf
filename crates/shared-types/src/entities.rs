//! # Core Domain Entities
//!
//! Records persisted on the ledger by the federation subsystems.
//!
//! ## Clusters
//!
//! - **Sessions**: `FlSession`, `SessionStatus`, `FinalStats`
//! - **Privacy**: `PrivacyBudgetRecord`, `BudgetAdjustmentRecord`
//! - **Rounds**: `ModelUpdateRecord`, `UpdateMetrics`, `AggregationRecord`
//! - **Reporting**: `AnomalyFlag`, `FlagSeverity`
//! - **Agreements**: `AgreementInfo`, `AgreementStatus`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization identifier, already resolved by the host.
pub type OrgId = String;

/// Federated-learning session identifier.
pub type SessionId = String;

/// Training round number (1-based once a session is active).
pub type Round = u32;

/// Unix timestamp in seconds since epoch.
pub type Timestamp = u64;

/// Target metric name that enables early completion.
pub const TARGET_METRIC_ACCURACY: &str = "accuracy";

// =============================================================================
// CLUSTER A: SESSIONS
// =============================================================================

/// Lifecycle status of a session.
///
/// ```text
/// [Initialized] ──start──→ [Active] ──round loop──→ [Active]
///                              │
///                              ├── aggregation at max round / target ──→ [Completed]
///                              ├── too few valid updates ──→ [Failed]
///                              └── manual completion ──→ [Completed]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initialized,
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Declared aggregation strategy. Recorded only; no weights are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregationMethod {
    #[default]
    #[serde(rename = "fedavg")]
    FedAvg,
    #[serde(rename = "fedprox")]
    FedProx,
    #[serde(rename = "median")]
    Median,
    #[serde(rename = "trimmed_mean")]
    TrimmedMean,
    #[serde(rename = "krum")]
    Krum,
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FedAvg => "fedavg",
            Self::FedProx => "fedprox",
            Self::Median => "median",
            Self::TrimmedMean => "trimmed_mean",
            Self::Krum => "krum",
        };
        f.write_str(name)
    }
}

/// Statistics captured when a session is completed manually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalStats {
    pub total_rounds: Round,
    pub final_accuracy: f64,
    pub best_accuracy: f64,
    pub best_round: Round,
    pub total_updates: u64,
    pub anomalies_detected: u64,
    /// `current_round / max_rounds * 100`.
    pub completion_rate: f64,
}

/// A federated-learning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlSession {
    pub session_id: SessionId,
    pub session_name: String,
    pub agreement_id: String,
    pub model_type: String,
    #[serde(default)]
    pub model_architecture: serde_json::Value,
    /// Declared participants in join order. Fixed once the session starts.
    pub participants: Vec<OrgId>,
    pub current_round: Round,
    pub max_rounds: Round,
    pub privacy_epsilon: f64,
    pub min_participants: usize,
    pub aggregation_method: AggregationMethod,
    pub learning_rate: f64,
    pub target_metric: String,
    pub target_value: f64,
    pub status: SessionStatus,
    pub created_by: OrgId,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub total_updates_received: u64,
    pub anomalies_detected: u64,
    pub current_accuracy: Option<f64>,
    pub best_accuracy: Option<f64>,
    pub best_round: Option<Round>,
    pub failure_reason: Option<String>,
    pub completion_reason: Option<String>,
    /// Aggregated metrics of the round that completed the session.
    pub final_metrics: Option<AggregatedMetrics>,
    /// Snapshot taken by manual completion.
    pub final_stats: Option<FinalStats>,
}

impl FlSession {
    /// Returns true if `org` is a declared participant.
    #[must_use]
    pub fn is_participant(&self, org: &str) -> bool {
        self.participants.iter().any(|p| p == org)
    }

    /// Per-participant epsilon allotment: `max_rounds * privacy_epsilon`.
    #[must_use]
    pub fn budget_allotment(&self) -> f64 {
        f64::from(self.max_rounds) * self.privacy_epsilon
    }

    /// Seats still open for joining.
    #[must_use]
    pub fn open_seats(&self) -> usize {
        crate::MAX_PARTICIPANTS.saturating_sub(self.participants.len())
    }
}

// =============================================================================
// CLUSTER B: PRIVACY
// =============================================================================

/// Audit trail of the last administrative adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAdjustmentRecord {
    pub reason: String,
    pub amount: f64,
    pub timestamp: Timestamp,
}

/// Epsilon budget of one organization, per session or global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyBudgetRecord {
    pub budget_id: String,
    pub org_id: OrgId,
    /// `None` for an organization's global budget.
    pub session_id: Option<SessionId>,
    pub total_budget: f64,
    pub remaining_budget: f64,
    pub last_updated: Timestamp,
    pub last_adjustment: Option<BudgetAdjustmentRecord>,
}

impl PrivacyBudgetRecord {
    /// Identifier of an organization's budget inside one session.
    #[must_use]
    pub fn session_budget_id(session_id: &str, org_id: &str) -> String {
        format!("BUDGET_{session_id}_{org_id}")
    }

    /// Identifier of an organization's global budget.
    #[must_use]
    pub fn global_budget_id(org_id: &str) -> String {
        format!("BUDGET_{org_id}")
    }

    /// Epsilon spent so far.
    #[must_use]
    pub fn used(&self) -> f64 {
        self.total_budget - self.remaining_budget
    }

    #[must_use]
    pub fn is_session_budget(&self) -> bool {
        self.session_id.is_some()
    }
}

// =============================================================================
// CLUSTER C: ROUNDS
// =============================================================================

/// Scalar metrics declared with an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
}

impl UpdateMetrics {
    #[must_use]
    pub fn new(accuracy: Option<f64>, loss: Option<f64>) -> Self {
        Self { accuracy, loss }
    }
}

/// One participant's submission for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUpdateRecord {
    pub update_id: String,
    pub session_id: SessionId,
    pub org_id: OrgId,
    pub round: Round,
    pub update_hash: String,
    pub privacy_budget_used: f64,
    pub submitted_at: Timestamp,
    pub anomaly_score: f64,
    pub is_valid: bool,
    pub metrics: UpdateMetrics,
    pub computation_time: Option<f64>,
    pub samples_used: Option<u64>,
}

/// Metrics of a closed round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub accuracy: f64,
    pub loss: f64,
    pub participants_count: usize,
}

/// Result of closing a round with enough valid updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRecord {
    pub session_id: SessionId,
    pub round: Round,
    pub method: AggregationMethod,
    pub participants_count: usize,
    pub timestamp: Timestamp,
    pub aggregated_model_hash: String,
    pub metrics: AggregatedMetrics,
}

// =============================================================================
// CLUSTER D: REPORTING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Free-standing report against an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub flag_id: String,
    pub update_id: String,
    pub reason: String,
    pub reported_by: OrgId,
    pub severity: FlagSeverity,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub evidence: serde_json::Value,
}

// =============================================================================
// CLUSTER E: AGREEMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    Pending,
    Active,
    Expired,
    Revoked,
}

/// Collaboration agreement as seen by the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementInfo {
    pub agreement_id: String,
    pub status: AgreementStatus,
    pub partner_orgs: Vec<OrgId>,
    #[serde(default)]
    pub terms: serde_json::Value,
}

impl AgreementInfo {
    #[must_use]
    pub fn is_partner(&self, org: &str) -> bool {
        self.partner_orgs.iter().any(|p| p == org)
    }
}
