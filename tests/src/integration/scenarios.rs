//! # Round Scenarios
//!
//! Three-organization training runs driven through the coordinator, checked
//! against the ledger records they leave behind.

#[cfg(test)]
mod tests {
    use crate::fixtures::{Federation, REGULATOR};
    use fl_02_privacy_budget::BudgetAdjustment;
    use fl_06_reporting::FlagRequest;
    use shared_types::{
        CallContext, FlError, FlagSeverity, KeyPrefix, ModelUpdateRecord, SessionStatus,
        StateConflict,
    };

    const ORGS: [&str; 3] = ["org1", "org2", "org3"];

    /// Round 1 of the three-organization run: everyone valid, budget 1.0 each.
    fn first_round(fed: &Federation) -> String {
        let session_id = fed.started_session(&ORGS, 3, 2, 1.0);
        fed.submit("org1", &session_id, 1, 0.80, 0.5, 1.0).unwrap();
        fed.submit("org2", &session_id, 1, 0.85, 0.4, 1.0).unwrap();
        let receipt = fed.submit("org3", &session_id, 1, 0.82, 0.45, 1.0).unwrap();
        assert!(receipt.round_closed.is_some());
        session_id
    }

    // =========================================================================
    // Scenario A: a clean round aggregates and advances
    // =========================================================================

    #[test]
    fn test_clean_round_aggregates_and_advances() {
        let fed = Federation::new();
        let session_id = first_round(&fed);

        let aggregation = fed.aggregation(&session_id, 1).unwrap();
        assert_eq!(aggregation.participants_count, 3);
        assert!((aggregation.metrics.accuracy - 0.823_333).abs() < 1e-3);

        let session = fed.session(&session_id);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.current_round, 2);
        assert_eq!(session.total_updates_received, 3);
        assert_eq!(session.anomalies_detected, 0);

        for org in ORGS {
            let budget = fed.budget(&session_id, org);
            assert_eq!(budget.total_budget, 3.0);
            assert!((budget.remaining_budget - 2.0).abs() < 1e-9);
        }

        let names = fed.events.names();
        assert_eq!(
            names.iter().filter(|n| **n == "ModelUpdateSubmitted").count(),
            3
        );
        assert_eq!(
            names.iter().filter(|n| **n == "AggregationCompleted").count(),
            1
        );
    }

    // =========================================================================
    // Scenario B: a late submission for a closed round
    // =========================================================================

    #[test]
    fn test_submission_for_closed_round_rejected() {
        let fed = Federation::new();
        let session_id = first_round(&fed);

        let result = fed.submit("org1", &session_id, 1, 0.9, 0.3, 1.0);
        assert_eq!(
            result.unwrap_err(),
            FlError::StateConflict(StateConflict::RoundMismatch {
                submitted: 1,
                current: 2,
            })
        );
        assert_eq!(fed.session(&session_id).total_updates_received, 3);
    }

    // =========================================================================
    // Scenario C: overspending the privacy budget
    // =========================================================================

    #[test]
    fn test_overspend_leaves_no_trace() {
        let fed = Federation::new();
        let session_id = first_round(&fed);
        let before = fed.session(&session_id);

        let result = fed.submit("org1", &session_id, 2, 0.86, 0.4, 5.0);
        assert!(matches!(
            result,
            Err(FlError::ResourceExhausted { remaining, requested })
                if (remaining - 2.0).abs() < 1e-9 && requested == 5.0
        ));

        assert!((fed.budget(&session_id, "org1").remaining_budget - 2.0).abs() < 1e-9);
        let update: Option<ModelUpdateRecord> =
            fed.read(&KeyPrefix::update_key(&session_id, 2, "org1"));
        assert!(update.is_none());
        assert_eq!(fed.session(&session_id), before);

        // The same organization can still submit within its budget.
        assert!(fed.submit("org1", &session_id, 2, 0.86, 0.4, 1.0).is_ok());
    }

    // =========================================================================
    // Scenario D: too few valid updates fails the session
    // =========================================================================

    #[test]
    fn test_anomalous_update_fails_small_session() {
        let fed = Federation::new();
        let session_id = fed.started_session(&["org1", "org2"], 3, 2, 1.0);

        fed.submit("org1", &session_id, 1, 0.8, 0.5, 1.0).unwrap();
        let receipt = fed.submit("org2", &session_id, 1, 0.8, 15.0, 1.0).unwrap();
        assert!(!receipt.is_valid);

        let closed = receipt.round_closed.unwrap();
        assert_eq!(closed.status, SessionStatus::Failed);
        assert!(!closed.aggregated);

        let session = fed.session(&session_id);
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.current_round, 1);
        assert!(session.failure_reason.is_some());
        assert_eq!(session.anomalies_detected, 1);
        assert!(fed.aggregation(&session_id, 1).is_none());

        // Terminal sessions accept nothing further.
        assert!(matches!(
            fed.submit("org1", &session_id, 1, 0.8, 0.5, 1.0),
            Err(FlError::StateConflict(StateConflict::WrongStatus { .. }))
        ));
    }

    // =========================================================================
    // Full lifecycle
    // =========================================================================

    #[test]
    fn test_session_completes_at_max_rounds() {
        let fed = Federation::new();
        let session_id = fed.started_session(&ORGS, 2, 2, 1.0);

        for round in 1..=2 {
            fed.time.advance(60);
            for (i, org) in ORGS.iter().enumerate() {
                let accuracy = 0.7 + 0.05 * f64::from(round) + 0.01 * i as f64;
                fed.submit(org, &session_id, round, accuracy, 0.5, 1.0).unwrap();
            }
        }

        let session = fed.session(&session_id);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.current_round, 2);
        assert!(session.final_metrics.is_some());
        assert_eq!(session.best_round, Some(2));

        let history = fed.stats.get_model_history(&session_id).unwrap();
        assert_eq!(history.rounds.len(), 2);
        assert!(history.rounds.iter().all(|r| r.updates.len() == 3));

        let progress = fed.stats.get_session_progress(&session_id).unwrap();
        assert_eq!(progress.progress_percentage, 100.0);

        let performance = fed.stats.get_organization_performance("org2").unwrap();
        assert_eq!(performance.sessions.completed, 1);
        assert_eq!(performance.updates.total, 2);

        for org in ORGS {
            let status = fed
                .stats
                .get_privacy_budget_status(org, Some(&session_id))
                .unwrap();
            assert_eq!(status.summary.total_used, 2.0);
            assert_eq!(status.summary.total_remaining, 0.0);
        }
    }

    #[test]
    fn test_target_accuracy_completes_early() {
        let fed = Federation::new();
        let session_id = fed.started_session(&["org1", "org2"], 5, 2, 1.0);

        fed.submit("org1", &session_id, 1, 0.96, 0.1, 1.0).unwrap();
        fed.submit("org2", &session_id, 1, 0.97, 0.1, 1.0).unwrap();

        let session = fed.session(&session_id);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.current_round, 1);
    }

    #[test]
    fn test_join_then_start_opens_budget() {
        let fed = Federation::new();
        let creator = CallContext::new("org1");
        let request = fl_05_session_manager::CreateSessionRequest::new("s", "AGR-1", "cnn", 4, 0.5)
            .with_participants(["org1"]);
        let session = fed.coordinator.create_session(&creator, request).unwrap();

        assert!(matches!(
            fed.coordinator.start_session(&creator, &session.session_id),
            Err(FlError::StateConflict(StateConflict::InsufficientParticipants { have: 1, need: 2 }))
        ));

        let available = fed.stats.get_available_sessions("org2").unwrap();
        assert_eq!(available.len(), 1);

        fed.coordinator
            .join_session(&CallContext::new("org2"), &session.session_id, "org2")
            .unwrap();
        let started = fed
            .coordinator
            .start_session(&CallContext::new("org2"), &session.session_id)
            .unwrap();
        assert_eq!(started.current_round, 1);
        assert_eq!(fed.budget(&session.session_id, "org2").total_budget, 2.0);
        assert!(fed.stats.get_available_sessions("org2").unwrap().is_empty());
    }

    #[test]
    fn test_manual_completion_and_budget_adjustment() {
        let fed = Federation::new();
        let session_id = first_round(&fed);
        let budget_id =
            shared_types::PrivacyBudgetRecord::session_budget_id(&session_id, "org1");

        let adjustment = BudgetAdjustment {
            add_to_total: Some(1.5),
            ..BudgetAdjustment::default()
        };
        assert!(matches!(
            fed.coordinator
                .update_privacy_budget(&CallContext::new("org1"), &budget_id, &adjustment),
            Err(FlError::Authorization { .. })
        ));
        let adjusted = fed
            .coordinator
            .update_privacy_budget(&CallContext::new(REGULATOR), &budget_id, &adjustment)
            .unwrap();
        assert!((adjusted.remaining_budget - 3.5).abs() < 1e-9);

        let completed = fed
            .coordinator
            .complete_session(&CallContext::new("org2"), &session_id, None)
            .unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);
        assert_eq!(completed.completion_reason.as_deref(), Some("Manual completion"));
        assert!(fed
            .coordinator
            .complete_session(&CallContext::new("org2"), &session_id, None)
            .is_err());
    }

    #[test]
    fn test_flagging_an_update() {
        let fed = Federation::new();
        let session_id = first_round(&fed);
        let update_id = shared_types::derive_update_id(&session_id, 1, "org2");

        let reporting = fl_06_reporting::AnomalyReporting::new(
            fed.ledger.clone(),
            std::sync::Arc::new(shared_types::TrustedPrincipalResolver),
            fed.events.clone(),
            fed.time.clone(),
        );
        let flag = reporting
            .flag_anomalous_update(
                &CallContext::new(REGULATOR),
                &update_id,
                FlagRequest::new("gradient looks poisoned"),
            )
            .unwrap();
        assert_eq!(flag.severity, FlagSeverity::Medium);
        assert_eq!(flag.reported_by, REGULATOR);
        assert_eq!(fed.events.names().last(), Some(&"AnomalyFlagged"));
    }
}
