//! # Event Handlers
//!
//! Subscribers spawned by the runtime. The coordinator publishes after each
//! commit; these tasks only observe.

use parking_lot::Mutex;
use shared_bus::{FederationEvent, Subscription};
use shared_types::SessionStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-event-name counters shared with the runtime.
#[derive(Debug, Default)]
pub struct EventStats {
    counts: Mutex<HashMap<&'static str, u64>>,
}

impl EventStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &FederationEvent) {
        *self.counts.lock().entry(event.name()).or_insert(0) += 1;
    }

    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.counts.lock().get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        self.counts.lock().clone()
    }
}

/// Logs every federation event and counts it.
pub struct FederationEventListener {
    subscription: Subscription,
    stats: Arc<EventStats>,
}

impl FederationEventListener {
    pub fn new(subscription: Subscription, stats: Arc<EventStats>) -> Self {
        Self {
            subscription,
            stats,
        }
    }

    /// Run until the bus is dropped.
    pub async fn run(mut self) {
        info!("[bus] Federation event listener started");
        while let Some(event) = self.subscription.recv().await {
            self.stats.record(&event);
            log_event(&event);
        }
        if self.subscription.lagged() > 0 {
            warn!(
                "[bus] Listener missed {} events",
                self.subscription.lagged()
            );
        }
        info!("[bus] Event bus closed, listener stopping");
    }
}

fn log_event(event: &FederationEvent) {
    match event {
        FederationEvent::SessionCreated {
            session_id,
            session_name,
            created_by,
            participants,
        } => info!(
            "[fl-05] 📋 {} created session {} '{}' ({} participants)",
            created_by,
            session_id,
            session_name,
            participants.len()
        ),
        FederationEvent::SessionStarted {
            session_id,
            participants,
            ..
        } => info!(
            "[fl-05] ▶ Session {} started with {:?}",
            session_id, participants
        ),
        FederationEvent::ParticipantJoined {
            session_id,
            org_id,
            total_participants,
        } => info!(
            "[fl-05] {} joined {} ({} participants)",
            org_id, session_id, total_participants
        ),
        FederationEvent::SessionCompleted {
            session_id,
            completion_reason,
            total_rounds,
        } => info!(
            "[fl-05] ✅ Session {} completed after {} rounds: {}",
            session_id, total_rounds, completion_reason
        ),
        FederationEvent::ModelUpdateSubmitted {
            update_id,
            org_id,
            round,
            is_valid,
            ..
        } => info!(
            "[fl-04] Update {} from {} for round {} (valid: {})",
            update_id, org_id, round, is_valid
        ),
        FederationEvent::AggregationCompleted {
            session_id,
            round,
            status: SessionStatus::Failed,
            ..
        } => warn!(
            "[fl-03] ❌ Session {} failed at round {}: too few valid updates",
            session_id, round
        ),
        FederationEvent::AggregationCompleted {
            session_id,
            round,
            next_round,
            status,
            current_accuracy,
        } => info!(
            "[fl-03] 📊 Round {} of {} aggregated (accuracy {:?}), status {}, next round {}",
            round, session_id, current_accuracy, status, next_round
        ),
        FederationEvent::AnomalyFlagged {
            update_id,
            flag_id,
            severity,
        } => warn!(
            "[fl-06] 🚩 Update {} flagged as {:?} ({})",
            update_id, severity, flag_id
        ),
    }
}
