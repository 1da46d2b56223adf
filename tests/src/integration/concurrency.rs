//! # Racing Submitters
//!
//! Threads share one in-memory ledger and retry with fresh reads when their
//! commit loses. Whatever the interleaving, every round is aggregated once.

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use crate::fixtures::Federation;
    use node_runtime::retry_on_conflict;
    use shared_types::{
        CallContext, FlError, KeyPrefix, ModelUpdateRecord, SessionStatus, StateConflict,
    };

    const ORGS: [&str; 3] = ["org1", "org2", "org3"];
    const RETRIES: u32 = 8;

    /// All participants submit round `round` at once.
    fn race_round(fed: &Federation, session_id: &str, round: u32) -> Vec<Result<bool, FlError>> {
        let barrier = Barrier::new(ORGS.len());
        thread::scope(|scope| {
            let handles: Vec<_> = ORGS
                .iter()
                .enumerate()
                .map(|(i, org)| {
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        let accuracy = 0.7 + 0.02 * f64::from(round) + 0.01 * i as f64;
                        retry_on_conflict(RETRIES, || {
                            fed.submit(org, session_id, round, accuracy, 0.4, 1.0)
                        })
                        .map(|receipt| receipt.round_closed.is_some())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_racing_rounds_aggregate_exactly_once() {
        for _ in 0..20 {
            let fed = Federation::new();
            let session_id = fed.started_session(&ORGS, 3, 2, 1.0);

            for round in 1..=3 {
                let results = race_round(&fed, &session_id, round);
                let closers = results
                    .iter()
                    .filter(|r| matches!(r, Ok(true)))
                    .count();
                assert!(results.iter().all(Result::is_ok), "{results:?}");
                assert_eq!(closers, 1, "round {round} closed {closers} times");
                assert!(fed.aggregation(&session_id, round).is_some());
            }

            let session = fed.session(&session_id);
            assert_eq!(session.status, SessionStatus::Completed);
            assert_eq!(session.total_updates_received, 9);
            assert_eq!(
                fed.events
                    .names()
                    .iter()
                    .filter(|n| **n == "AggregationCompleted")
                    .count(),
                3
            );
            for org in ORGS {
                assert!(fed.budget(&session_id, org).remaining_budget.abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_duplicate_race_admits_one() {
        let fed = Federation::new();
        let session_id = fed.started_session(&ORGS, 3, 2, 1.0);
        let barrier = Barrier::new(2);

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let barrier = &barrier;
                    let fed = &fed;
                    let session_id = &session_id;
                    scope.spawn(move || {
                        barrier.wait();
                        retry_on_conflict(RETRIES, || {
                            fed.submit("org1", session_id, 1, 0.8, 0.4, 1.0)
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(FlError::StateConflict(StateConflict::DuplicateSubmission { round: 1, .. }))
        )));

        let stored: Option<ModelUpdateRecord> =
            fed.read(&KeyPrefix::update_key(&session_id, 1, "org1"));
        assert!(stored.is_some());
        assert!((fed.budget(&session_id, "org1").remaining_budget - 2.0).abs() < 1e-9);
        assert_eq!(fed.session(&session_id).total_updates_received, 1);
    }

    #[test]
    fn test_last_seat_goes_to_one_joiner() {
        let fed = Federation::new();
        let creator = CallContext::new("org1");
        let request =
            fl_05_session_manager::CreateSessionRequest::new("s", "AGR-1", "cnn", 2, 1.0)
                .with_participants(["org1", "org2"]);
        let session_id = fed.coordinator.create_session(&creator, request).unwrap().session_id;

        let joiners = ["org3", "org4", "org5"];
        let barrier = Barrier::new(joiners.len());
        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = joiners
                .iter()
                .map(|org| {
                    let barrier = &barrier;
                    let fed = &fed;
                    let session_id = &session_id;
                    scope.spawn(move || {
                        barrier.wait();
                        retry_on_conflict(RETRIES, || {
                            fed.coordinator
                                .join_session(&CallContext::new(*org), session_id, org)
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(
                    r,
                    Err(FlError::StateConflict(StateConflict::ParticipantLimit { limit: 3 }))
                ))
                .count(),
            2
        );
        assert_eq!(fed.session(&session_id).participants.len(), 3);
    }
}
