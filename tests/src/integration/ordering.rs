//! # Submission Order
//!
//! Participants of a round may report in any order. The last arrival closes
//! the round, and the aggregate does not depend on who came first.

#[cfg(test)]
mod tests {
    use crate::fixtures::Federation;
    use proptest::prelude::*;
    use shared_types::SessionStatus;

    const ORGS: [&str; 4] = ["org1", "org2", "org3", "org4"];
    const ROUNDS: usize = 3;

    fn round_orders() -> impl Strategy<Value = Vec<Vec<&'static str>>> {
        proptest::collection::vec(Just(ORGS.to_vec()).prop_shuffle(), ROUNDS)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_order_aggregates_each_round_once(
            orders in round_orders(),
            accuracies in proptest::collection::vec(0.5f64..0.9, ROUNDS * ORGS.len()),
        ) {
            let fed = Federation::new();
            let session_id = fed.started_session(&ORGS, ROUNDS as u32, 2, 1.0);

            for (i, order) in orders.iter().enumerate() {
                let round = i as u32 + 1;
                let mut closers = Vec::new();
                let mut sum = 0.0;

                for (j, org) in order.iter().enumerate() {
                    let accuracy = accuracies[i * ORGS.len() + j];
                    sum += accuracy;
                    let receipt = fed.submit(org, &session_id, round, accuracy, 0.5, 1.0).unwrap();
                    prop_assert!(receipt.is_valid);
                    if receipt.round_closed.is_some() {
                        closers.push(j);
                    }
                }

                prop_assert_eq!(closers, vec![ORGS.len() - 1]);
                let aggregation = fed.aggregation(&session_id, round).unwrap();
                prop_assert_eq!(aggregation.participants_count, ORGS.len());
                prop_assert!((aggregation.metrics.accuracy - sum / ORGS.len() as f64).abs() < 1e-6);
            }

            let session = fed.session(&session_id);
            prop_assert_eq!(session.status, SessionStatus::Completed);
            prop_assert_eq!(session.total_updates_received, (ROUNDS * ORGS.len()) as u64);
            prop_assert_eq!(
                fed.events.names().iter().filter(|n| **n == "AggregationCompleted").count(),
                ROUNDS
            );
        }
    }
}
