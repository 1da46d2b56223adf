//! Write-side operation surface.

use super::{CoordinatorConfig, CoordinatorDeps, SessionManager};
use crate::domain::CreateSessionRequest;
use fl_02_privacy_budget::{BudgetAdjustment, PrivacyBudgetLedger};
use fl_03_aggregation::Aggregator;
use fl_04_update_intake::{SubmissionReceipt, SubmitModelUpdateRequest, UpdateIntake};
use shared_types::{CallContext, FlError, FlSession, OrgId, PrivacyBudgetRecord};
use std::sync::Arc;

/// Session lifecycle plus update intake over one ledger.
pub struct FederationCoordinator {
    sessions: SessionManager,
    intake: UpdateIntake,
}

impl FederationCoordinator {
    pub fn new(deps: CoordinatorDeps, config: CoordinatorConfig) -> Self {
        let budgets = Arc::new(PrivacyBudgetLedger::new(deps.time.clone()));
        let aggregator = Arc::new(Aggregator::new(deps.time.clone()));
        let intake = UpdateIntake::new(
            deps.ledger.clone(),
            budgets.clone(),
            aggregator,
            deps.identity.clone(),
            deps.publisher.clone(),
            deps.time.clone(),
        );
        Self {
            sessions: SessionManager::new(deps, budgets, config),
            intake,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn create_session(
        &self,
        ctx: &CallContext,
        request: CreateSessionRequest,
    ) -> Result<FlSession, FlError> {
        self.sessions.create_session(ctx, request)
    }

    pub fn start_session(&self, ctx: &CallContext, session_id: &str) -> Result<FlSession, FlError> {
        self.sessions.start_session(ctx, session_id)
    }

    pub fn join_session(
        &self,
        ctx: &CallContext,
        session_id: &str,
        org_id: &str,
    ) -> Result<FlSession, FlError> {
        self.sessions.join_session(ctx, session_id, org_id)
    }

    pub fn submit_model_update(
        &self,
        ctx: &CallContext,
        request: SubmitModelUpdateRequest,
    ) -> Result<SubmissionReceipt, FlError> {
        self.intake.submit_model_update(ctx, request)
    }

    pub fn complete_session(
        &self,
        ctx: &CallContext,
        session_id: &str,
        reason: Option<String>,
    ) -> Result<FlSession, FlError> {
        self.sessions.complete_session(ctx, session_id, reason)
    }

    pub fn update_privacy_budget(
        &self,
        ctx: &CallContext,
        budget_id: &str,
        adjustment: &BudgetAdjustment,
    ) -> Result<PrivacyBudgetRecord, FlError> {
        self.sessions
            .update_privacy_budget(ctx, budget_id, adjustment)
    }

    pub fn bootstrap_global_budgets(
        &self,
        orgs: &[OrgId],
        amount: f64,
    ) -> Result<Vec<String>, FlError> {
        self.sessions.bootstrap_global_budgets(orgs, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_01_ledger::InMemoryLedger;
    use shared_bus::RecordingPublisher;
    use shared_types::{ManualTimeSource, SequentialIdGenerator, SessionStatus, UpdateMetrics};

    fn submit(org: &str, round: u32, accuracy: f64) -> SubmitModelUpdateRequest {
        SubmitModelUpdateRequest {
            session_id: "FL-1".into(),
            org_id: org.into(),
            round,
            update_hash: format!("{org}-{round}"),
            privacy_budget_used: 1.0,
            metrics: Some(UpdateMetrics::new(Some(accuracy), Some(0.4))),
            computation_time: None,
            samples_used: None,
        }
    }

    #[test]
    fn test_full_session_to_max_rounds() {
        let events = Arc::new(RecordingPublisher::new());
        let deps = CoordinatorDeps::new(Arc::new(InMemoryLedger::new()), events.clone())
            .with_ids(Arc::new(SequentialIdGenerator::new()))
            .with_time(Arc::new(ManualTimeSource::new(10)));
        let fc = FederationCoordinator::new(deps, CoordinatorConfig::default());

        let org1 = CallContext::new("org1");
        let org2 = CallContext::new("org2");
        let request = CreateSessionRequest::new("s", "AGR-1", "cnn", 2, 1.0)
            .with_participants(["org1", "org2"]);
        fc.create_session(&org1, request).unwrap();
        fc.start_session(&org1, "FL-1").unwrap();

        for round in 1..=2 {
            fc.submit_model_update(&org1, submit("org1", round, 0.7)).unwrap();
            let receipt = fc
                .submit_model_update(&org2, submit("org2", round, 0.8))
                .unwrap();
            assert!(receipt.round_closed.is_some());
        }

        // Session is over; the next submission is refused.
        let err = fc
            .submit_model_update(&org1, submit("org1", 3, 0.7))
            .unwrap_err();
        assert!(matches!(err, FlError::StateConflict(_)));

        let done = fc.complete_session(&org1, "FL-1", None);
        assert!(done.is_err());

        let names = events.names();
        assert_eq!(names.first(), Some(&"FLSessionCreated"));
        assert_eq!(
            names.iter().filter(|n| **n == "AggregationCompleted").count(),
            2
        );
        let last_status = events.events().into_iter().rev().find_map(|e| match e {
            shared_bus::FederationEvent::AggregationCompleted { status, .. } => Some(status),
            _ => None,
        });
        assert_eq!(last_status, Some(SessionStatus::Completed));
    }
}
