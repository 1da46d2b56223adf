//! # Node Wiring
//!
//! A full [`node_runtime::FederationContainer`]: round results reach bus
//! listeners in order, and with the persistent backend a restarted node finds
//! the finished session where it left it.

#[cfg(test)]
mod tests {
    use node_runtime::demo::{run_demo, DEMO_ROUNDS};
    use node_runtime::{FederationContainer, NodeConfig};
    use shared_bus::{EventFilter, EventTopic, FederationEvent};
    use shared_types::SessionStatus;

    #[tokio::test]
    async fn test_round_results_arrive_in_round_order() {
        let container = FederationContainer::new(NodeConfig::default()).unwrap();
        let mut sub = container
            .event_bus
            .subscribe(EventFilter::topics(vec![EventTopic::Aggregation]));

        let summary = run_demo(&container).unwrap();

        for expected in 1..=DEMO_ROUNDS {
            let Some(FederationEvent::AggregationCompleted {
                session_id,
                round,
                next_round,
                status,
                current_accuracy,
            }) = sub.recv().await
            else {
                panic!("round {expected} was not reported");
            };
            assert_eq!(session_id, summary.session_id);
            assert_eq!(round, expected);
            assert!(current_accuracy.is_some());
            if expected < DEMO_ROUNDS {
                assert_eq!((next_round, status), (expected + 1, SessionStatus::Active));
            } else {
                assert_eq!((next_round, status), (expected, SessionStatus::Completed));
            }
        }
        assert_eq!(sub.lagged(), 0);
    }

    #[cfg(feature = "rocksdb")]
    mod persistent {
        use super::*;
        use node_runtime::demo::DEMO_ORGS;
        use node_runtime::LedgerBackend;
        use std::path::Path;

        fn config(dir: &Path) -> NodeConfig {
            let mut config = NodeConfig::default();
            config.storage.backend = LedgerBackend::RocksDb;
            config.storage.data_dir = dir.to_path_buf();
            config.storage.min_disk_space_percent = 0;
            config
        }

        #[test]
        fn test_completed_session_survives_restart() {
            let dir = tempfile::tempdir().unwrap();
            let session_id = {
                let node = FederationContainer::new(config(dir.path())).unwrap();
                run_demo(&node).unwrap().session_id
            };

            let node = FederationContainer::new(config(dir.path())).unwrap();
            let progress = node.stats.get_session_progress(&session_id).unwrap();
            assert_eq!(progress.status, SessionStatus::Completed);
            assert_eq!(progress.current_round, DEMO_ROUNDS);

            let history = node.stats.get_model_history(&session_id).unwrap();
            assert_eq!(history.rounds.len(), DEMO_ROUNDS as usize);
            for org in DEMO_ORGS {
                let status = node
                    .stats
                    .get_privacy_budget_status(org, Some(&session_id))
                    .unwrap();
                assert!((status.summary.total_used - 2.4).abs() < 1e-9);
            }
        }

        #[tokio::test]
        async fn test_restarted_node_runs_another_session() {
            let dir = tempfile::tempdir().unwrap();
            let first = {
                let node = FederationContainer::new(config(dir.path())).unwrap();
                run_demo(&node).unwrap().session_id
            };

            let node = FederationContainer::new(config(dir.path())).unwrap();
            let mut sub = node
                .event_bus
                .subscribe(EventFilter::topics(vec![EventTopic::Session]));
            let second = run_demo(&node).unwrap();
            assert_ne!(second.session_id, first);
            assert_eq!(second.stats.total_sessions, 2);
            assert_eq!(second.stats.completed_sessions, 2);

            assert!(matches!(
                sub.recv().await,
                Some(FederationEvent::SessionCreated { session_id, .. }) if session_id == second.session_id
            ));
        }
    }
}
