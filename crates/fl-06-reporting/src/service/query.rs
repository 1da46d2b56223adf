use super::{decoded, get_json};
use crate::domain::{
    self, AvailableSession, BudgetUsage, ModelHistory, MySession, OrganizationPerformance,
    PrivacyBudgetStatus, SessionDetails, SessionProgress, SystemStats,
};
use fl_01_ledger::LedgerStore;
use serde::de::DeserializeOwned;
use shared_types::{
    prefix_range, AggregationRecord, EntityKind, FlError, FlSession, KeyPrefix,
    ModelUpdateRecord, PrivacyBudgetRecord, TimeSource,
};
use std::sync::Arc;
use tracing::debug;

/// Read-only statistics over the ledger.
pub struct StatsQuery {
    ledger: Arc<dyn LedgerStore>,
    time: Arc<dyn TimeSource>,
}

impl StatsQuery {
    pub fn new(ledger: Arc<dyn LedgerStore>, time: Arc<dyn TimeSource>) -> Self {
        Self { ledger, time }
    }

    fn scan_prefix<'a, T: DeserializeOwned + 'a>(
        &'a self,
        prefix: &str,
    ) -> impl Iterator<Item = Result<T, FlError>> + 'a {
        let (low, high) = prefix_range(prefix);
        decoded(self.ledger.range_scan(&low, &high))
    }

    fn scan_family<'a, T: DeserializeOwned + 'a>(
        &'a self,
        family: KeyPrefix,
    ) -> impl Iterator<Item = Result<T, FlError>> + 'a {
        self.scan_prefix(family.as_str())
    }

    fn load_session(&self, session_id: &str) -> Result<FlSession, FlError> {
        get_json(self.ledger.as_ref(), &KeyPrefix::session_key(session_id))?
            .ok_or_else(|| FlError::not_found(EntityKind::Session, session_id))
    }

    fn aggregations(&self, session_id: &str) -> Result<Vec<AggregationRecord>, FlError> {
        self.scan_prefix(&KeyPrefix::session_aggregations_prefix(session_id))
            .collect()
    }

    pub fn get_session_details(&self, session_id: &str) -> Result<SessionDetails, FlError> {
        let session = self.load_session(session_id)?;
        let mut details = SessionDetails::new(session);
        for update in
            self.scan_prefix::<ModelUpdateRecord>(&KeyPrefix::session_updates_prefix(session_id))
        {
            details.add_update(&update?);
        }
        for aggregation in self.aggregations(session_id)? {
            details.add_aggregation(aggregation);
        }
        debug!(
            "[fl-06] Details for {}: {} rounds",
            session_id,
            details.round_updates.len()
        );
        Ok(details)
    }

    pub fn get_session_progress(&self, session_id: &str) -> Result<SessionProgress, FlError> {
        let session = self.load_session(session_id)?;
        let aggregations = self.aggregations(session_id)?;
        Ok(domain::session_progress(
            &session,
            &aggregations,
            self.time.now(),
        ))
    }

    pub fn get_model_history(&self, session_id: &str) -> Result<ModelHistory, FlError> {
        let session = self.load_session(session_id)?;
        let mut history = ModelHistory::new(&session);
        for update in
            self.scan_prefix::<ModelUpdateRecord>(&KeyPrefix::session_updates_prefix(session_id))
        {
            history.add_update(&update?);
        }
        for aggregation in self.aggregations(session_id)? {
            history.add_aggregation(aggregation);
        }
        Ok(history)
    }

    /// One session budget of `org_id`, or all of its budgets (global
    /// included) when `session_id` is `None`. A missing session budget
    /// yields an empty list.
    pub fn get_privacy_budget_status(
        &self,
        org_id: &str,
        session_id: Option<&str>,
    ) -> Result<PrivacyBudgetStatus, FlError> {
        let budgets = match session_id {
            Some(session_id) => {
                let id = PrivacyBudgetRecord::session_budget_id(session_id, org_id);
                get_json::<PrivacyBudgetRecord>(self.ledger.as_ref(), &KeyPrefix::budget_key(&id))?
                    .into_iter()
                    .collect()
            }
            None => {
                let mut budgets = Vec::new();
                for budget in self.scan_family::<PrivacyBudgetRecord>(KeyPrefix::Budget) {
                    let budget = budget?;
                    if budget.org_id == org_id {
                        budgets.push(budget);
                    }
                }
                budgets
            }
        };
        Ok(PrivacyBudgetStatus::new(
            org_id.to_string(),
            budgets,
            self.time.now(),
        ))
    }

    pub fn get_system_stats(&self) -> Result<SystemStats, FlError> {
        let mut stats = SystemStats::default();
        for session in self.scan_family::<FlSession>(KeyPrefix::Session) {
            stats.record_session(&session?);
        }
        for budget in self.scan_family::<PrivacyBudgetRecord>(KeyPrefix::Budget) {
            stats.record_budget(&budget?);
        }
        Ok(stats.finish(self.time.now()))
    }

    pub fn get_organization_performance(
        &self,
        org_id: &str,
    ) -> Result<OrganizationPerformance, FlError> {
        let mut perf = OrganizationPerformance::new(org_id.to_string());
        for session in self.scan_family::<FlSession>(KeyPrefix::Session) {
            let session = session?;
            if !session.is_participant(org_id) {
                continue;
            }
            perf.record_session(&session);
            for round in 1..=session.current_round {
                let key = KeyPrefix::update_key(&session.session_id, round, org_id);
                if let Some(update) = get_json::<ModelUpdateRecord>(self.ledger.as_ref(), &key)? {
                    perf.record_update(&update);
                }
            }
        }
        for budget in self.scan_family::<PrivacyBudgetRecord>(KeyPrefix::Budget) {
            perf.record_budget(&budget?);
        }
        Ok(perf.finish(self.time.now()))
    }

    /// Initialized sessions `org_id` could join, newest first.
    pub fn get_available_sessions(&self, org_id: &str) -> Result<Vec<AvailableSession>, FlError> {
        let mut offers = Vec::new();
        for session in self.scan_family::<FlSession>(KeyPrefix::Session) {
            if let Some(offer) = AvailableSession::offer(&session?, org_id) {
                offers.push(offer);
            }
        }
        domain::sort_newest_first(&mut offers, |o| o.created_at);
        Ok(offers)
    }

    /// Sessions `org_id` participates in with its spend, newest first.
    pub fn get_my_sessions(&self, org_id: &str) -> Result<Vec<MySession>, FlError> {
        let mut mine = Vec::new();
        for session in self.scan_family::<FlSession>(KeyPrefix::Session) {
            let session = session?;
            if !session.is_participant(org_id) {
                continue;
            }
            let budget_id = PrivacyBudgetRecord::session_budget_id(&session.session_id, org_id);
            let budget: Option<PrivacyBudgetRecord> =
                get_json(self.ledger.as_ref(), &KeyPrefix::budget_key(&budget_id))?;
            mine.push(MySession {
                my_privacy_budget: budget.as_ref().map(BudgetUsage::from),
                session,
            });
        }
        domain::sort_newest_first(&mut mine, |m| m.session.created_at);
        Ok(mine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_01_ledger::{InMemoryLedger, LedgerTransaction};
    use shared_types::{
        AggregatedMetrics, AggregationMethod, ManualTimeSource, SessionStatus, UpdateMetrics,
    };

    fn session(id: &str, status: SessionStatus, participants: &[&str], created_at: u64) -> FlSession {
        FlSession {
            session_id: id.into(),
            session_name: format!("{id}-name"),
            agreement_id: "AGR-1".into(),
            model_type: "cnn".into(),
            model_architecture: serde_json::Value::Null,
            participants: participants.iter().map(|p| p.to_string()).collect(),
            current_round: if status == SessionStatus::Initialized { 0 } else { 2 },
            max_rounds: 3,
            privacy_epsilon: 1.0,
            min_participants: 2,
            aggregation_method: AggregationMethod::FedAvg,
            learning_rate: 0.01,
            target_metric: "accuracy".into(),
            target_value: 0.95,
            status,
            created_by: participants.first().map(|p| p.to_string()).unwrap_or_default(),
            created_at,
            started_at: Some(100),
            completed_at: None,
            total_updates_received: 3,
            anomalies_detected: 1,
            current_accuracy: Some(0.7),
            best_accuracy: Some(0.7),
            best_round: Some(1),
            failure_reason: None,
            completion_reason: None,
            final_metrics: None,
            final_stats: None,
        }
    }

    fn update(session: &str, round: u32, org: &str, valid: bool) -> ModelUpdateRecord {
        ModelUpdateRecord {
            update_id: shared_types::derive_update_id(session, round, org),
            session_id: session.into(),
            org_id: org.into(),
            round,
            update_hash: format!("h-{org}-{round}"),
            privacy_budget_used: 0.5,
            submitted_at: 100 + u64::from(round),
            anomaly_score: if valid { 0.2 } else { 0.9 },
            is_valid: valid,
            metrics: UpdateMetrics::new(Some(0.7), Some(0.3)),
            computation_time: None,
            samples_used: None,
        }
    }

    fn budget(session: Option<&str>, org: &str, total: f64, remaining: f64) -> PrivacyBudgetRecord {
        PrivacyBudgetRecord {
            budget_id: session.map_or_else(
                || PrivacyBudgetRecord::global_budget_id(org),
                |s| PrivacyBudgetRecord::session_budget_id(s, org),
            ),
            org_id: org.into(),
            session_id: session.map(str::to_string),
            total_budget: total,
            remaining_budget: remaining,
            last_updated: 0,
            last_adjustment: None,
        }
    }

    /// FL-1 active in round 2 after one aggregation, FL-2 open, FL-10
    /// completed (shares the `FL-1` prefix).
    fn seeded() -> StatsQuery {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut tx = LedgerTransaction::begin(ledger.as_ref());
        let mut done = session("FL-10", SessionStatus::Completed, &["org1", "org3"], 50);
        done.current_accuracy = Some(0.9);
        for s in [
            session("FL-1", SessionStatus::Active, &["org1", "org2"], 10),
            session("FL-2", SessionStatus::Initialized, &["org2"], 30),
            done,
        ] {
            tx.put_json(KeyPrefix::session_key(&s.session_id), &s).unwrap();
        }
        for u in [
            update("FL-1", 1, "org2", true),
            update("FL-1", 1, "org1", true),
            update("FL-1", 2, "org1", false),
            update("FL-10", 1, "org1", true),
        ] {
            tx.put_json(KeyPrefix::update_key(&u.session_id, u.round, &u.org_id), &u)
                .unwrap();
        }
        let agg = AggregationRecord {
            session_id: "FL-1".into(),
            round: 1,
            method: AggregationMethod::FedAvg,
            participants_count: 2,
            timestamp: 150,
            aggregated_model_hash: shared_types::aggregated_model_hash("FL-1", 1),
            metrics: AggregatedMetrics {
                accuracy: 0.7,
                loss: 0.3,
                participants_count: 2,
            },
        };
        tx.put_json(KeyPrefix::aggregation_key("FL-1", 1), &agg).unwrap();
        for b in [
            budget(Some("FL-1"), "org1", 3.0, 2.0),
            budget(Some("FL-1"), "org2", 3.0, 2.5),
            budget(Some("FL-10"), "org1", 3.0, 2.5),
            budget(None, "org1", 10.0, 10.0),
        ] {
            tx.put_json(KeyPrefix::budget_key(&b.budget_id), &b).unwrap();
        }
        tx.commit().unwrap();

        StatsQuery::new(ledger, Arc::new(ManualTimeSource::new(200)))
    }

    #[test]
    fn test_session_details() {
        let q = seeded();
        let details = q.get_session_details("FL-1").unwrap();
        assert_eq!(details.round_updates.len(), 2);
        let round1 = &details.round_updates[&1];
        let orgs: Vec<_> = round1.updates.iter().map(|u| u.org_id.as_str()).collect();
        assert_eq!(orgs, vec!["org1", "org2"]);
        assert!(round1.aggregation.is_some());
        assert_eq!(details.round_updates[&2].updates.len(), 1);
        assert!(details.round_updates[&2].aggregation.is_none());

        assert!(matches!(
            q.get_session_details("FL-404"),
            Err(FlError::NotFound { entity: EntityKind::Session, .. })
        ));
    }

    #[test]
    fn test_progress_and_history() {
        let q = seeded();
        let progress = q.get_session_progress("FL-1").unwrap();
        assert_eq!(progress.round_history.len(), 1);
        // One round in 100s, two rounds to go.
        assert_eq!(progress.estimated_completion, Some(400));

        let history = q.get_model_history("FL-1").unwrap();
        assert_eq!(history.rounds.len(), 2);
        assert_eq!(history.rounds[0].updates.len(), 2);
        assert_eq!(history.rounds[1].updates[0].update_hash, "h-org1-2");
    }

    #[test]
    fn test_budget_status() {
        let q = seeded();
        let all = q.get_privacy_budget_status("org1", None).unwrap();
        assert_eq!(all.budgets.len(), 3);
        assert_eq!(all.summary.total_allocated, 16.0);
        assert_eq!(all.summary.total_used, 1.5);

        let one = q.get_privacy_budget_status("org1", Some("FL-1")).unwrap();
        assert_eq!(one.budgets.len(), 1);
        assert_eq!(one.timestamp, 200);

        let none = q.get_privacy_budget_status("org1", Some("FL-404")).unwrap();
        assert!(none.budgets.is_empty());
    }

    #[test]
    fn test_system_stats() {
        let stats = seeded().get_system_stats().unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.total_updates, 9);
        assert_eq!(stats.total_privacy_budget_used, 2.0);
    }

    #[test]
    fn test_organization_performance() {
        let perf = seeded().get_organization_performance("org1").unwrap();
        assert_eq!(perf.sessions.total, 2);
        assert_eq!(perf.sessions.completed, 1);
        assert_eq!(perf.updates.total, 3);
        assert_eq!(perf.updates.anomalous, 1);
        assert_eq!(perf.best_accuracy, 0.9);
        assert_eq!(perf.privacy_budget.total_allocated, 6.0);
        assert!((perf.participation_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_listings_newest_first() {
        let q = seeded();
        let available = q.get_available_sessions("org3").unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].session_id, "FL-2");
        assert_eq!(available[0].spots_available, 2);
        assert!(q.get_available_sessions("org2").unwrap().is_empty());

        let mine = q.get_my_sessions("org1").unwrap();
        let ids: Vec<_> = mine.iter().map(|m| m.session.session_id.as_str()).collect();
        assert_eq!(ids, vec!["FL-10", "FL-1"]);
        assert_eq!(mine[1].my_privacy_budget.unwrap().used, 1.0);
    }
}
