//! Shared harness: one coordinator over an in-memory ledger with a recording
//! publisher, sequential session ids and a manual clock.

use std::sync::Arc;

use fl_01_ledger::{InMemoryLedger, LedgerStore};
use fl_04_update_intake::{SubmissionReceipt, SubmitModelUpdateRequest};
use fl_05_session_manager::{
    CoordinatorConfig, CoordinatorDeps, CreateSessionRequest, FederationCoordinator,
};
use fl_06_reporting::StatsQuery;
use shared_bus::RecordingPublisher;
use shared_types::{
    AggregationRecord, CallContext, FlError, FlSession, KeyPrefix, ManualTimeSource,
    PrivacyBudgetRecord, Round, SequentialIdGenerator, UpdateMetrics,
};

pub const REGULATOR: &str = "regulator";
pub const START_TIME: u64 = 1_000;

pub struct Federation {
    pub ledger: Arc<InMemoryLedger>,
    pub events: Arc<RecordingPublisher>,
    pub time: Arc<ManualTimeSource>,
    pub coordinator: FederationCoordinator,
    pub stats: StatsQuery,
}

impl Default for Federation {
    fn default() -> Self {
        Self::new()
    }
}

impl Federation {
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let events = Arc::new(RecordingPublisher::new());
        let time = Arc::new(ManualTimeSource::new(START_TIME));

        let deps = CoordinatorDeps::new(ledger.clone(), events.clone())
            .with_ids(Arc::new(SequentialIdGenerator::new()))
            .with_time(time.clone());
        let coordinator =
            FederationCoordinator::new(deps, CoordinatorConfig::with_admins([REGULATOR]));
        let stats = StatsQuery::new(ledger.clone(), time.clone());

        Self {
            ledger,
            events,
            time,
            coordinator,
            stats,
        }
    }

    /// Create a session as the first participant and start it.
    pub fn started_session(
        &self,
        participants: &[&str],
        max_rounds: u32,
        min_participants: usize,
        epsilon: f64,
    ) -> String {
        let creator = CallContext::new(participants[0]);
        let request = CreateSessionRequest::new("scenario", "AGR-1", "cnn", max_rounds, epsilon)
            .with_participants(participants.iter().copied())
            .with_min_participants(min_participants);
        let session = self.coordinator.create_session(&creator, request).unwrap();
        self.coordinator
            .start_session(&creator, &session.session_id)
            .unwrap();
        session.session_id
    }

    pub fn submit(
        &self,
        org: &str,
        session_id: &str,
        round: Round,
        accuracy: f64,
        loss: f64,
        budget: f64,
    ) -> Result<SubmissionReceipt, FlError> {
        self.coordinator.submit_model_update(
            &CallContext::new(org),
            update_request(org, session_id, round, accuracy, loss, budget),
        )
    }

    pub fn session(&self, session_id: &str) -> FlSession {
        self.stats.get_session_details(session_id).unwrap().session
    }

    pub fn budget(&self, session_id: &str, org: &str) -> PrivacyBudgetRecord {
        let id = PrivacyBudgetRecord::session_budget_id(session_id, org);
        self.read(&KeyPrefix::budget_key(&id)).unwrap()
    }

    pub fn aggregation(&self, session_id: &str, round: Round) -> Option<AggregationRecord> {
        self.read(&KeyPrefix::aggregation_key(session_id, round))
    }

    pub fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.ledger
            .get(key)
            .unwrap()
            .map(|entry| serde_json::from_slice(&entry.value).unwrap())
    }
}

pub fn update_request(
    org: &str,
    session_id: &str,
    round: Round,
    accuracy: f64,
    loss: f64,
    budget: f64,
) -> SubmitModelUpdateRequest {
    SubmitModelUpdateRequest {
        session_id: session_id.to_string(),
        org_id: org.to_string(),
        round,
        update_hash: format!("sha256:{org}:{round}"),
        privacy_budget_used: budget,
        metrics: Some(UpdateMetrics::new(Some(accuracy), Some(loss))),
        computation_time: None,
        samples_used: None,
    }
}
