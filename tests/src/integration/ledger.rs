//! # Ledger Semantics
//!
//! Optimistic commit validation and ordered, bounded range scans as seen by
//! transactions over the in-memory store.

#[cfg(test)]
mod tests {
    use fl_01_ledger::{InMemoryLedger, LedgerError, LedgerStore, LedgerTransaction};
    use shared_types::{prefix_range, FlError, KeyPrefix};

    #[test]
    fn test_stale_read_rejects_commit() {
        let ledger = InMemoryLedger::new();
        let key = KeyPrefix::session_key("FL-1");

        let mut setup = LedgerTransaction::begin(&ledger);
        setup.put(key.clone(), b"v1".to_vec());
        setup.commit().unwrap();

        let mut slow = LedgerTransaction::begin(&ledger);
        assert_eq!(slow.get(&key).unwrap(), Some(b"v1".to_vec()));

        let mut fast = LedgerTransaction::begin(&ledger);
        fast.get(&key).unwrap();
        fast.put(key.clone(), b"v2".to_vec());
        fast.commit().unwrap();

        slow.put(key.clone(), b"v3".to_vec());
        slow.put(KeyPrefix::flag_key("F-1"), b"side effect".to_vec());
        let err = slow.commit().unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { .. }));
        assert!(FlError::from(err).is_retryable());

        // Nothing from the rejected change set landed.
        assert_eq!(ledger.get(&key).unwrap().unwrap().value, b"v2".to_vec());
        assert!(ledger.get(&KeyPrefix::flag_key("F-1")).unwrap().is_none());
    }

    #[test]
    fn test_absent_key_race_conflicts() {
        let ledger = InMemoryLedger::new();
        let key = KeyPrefix::update_key("FL-1", 1, "org1");

        let mut first = LedgerTransaction::begin(&ledger);
        let mut second = LedgerTransaction::begin(&ledger);
        assert!(!first.exists(&key).unwrap());
        assert!(!second.exists(&key).unwrap());

        first.put(key.clone(), b"a".to_vec());
        second.put(key.clone(), b"b".to_vec());
        first.commit().unwrap();
        assert!(second.commit().is_err());
        assert_eq!(ledger.get(&key).unwrap().unwrap().value, b"a".to_vec());
    }

    #[test]
    fn test_round_scan_is_ordered_and_bounded() {
        let ledger = InMemoryLedger::new();
        let mut tx = LedgerTransaction::begin(&ledger);
        for round in [1, 9, 10, 11] {
            for org in ["org2", "org1"] {
                tx.put(KeyPrefix::update_key("FL-1", round, org), vec![round as u8]);
            }
        }
        tx.put(KeyPrefix::update_key("FL-10", 1, "org1"), vec![0]);
        tx.put(KeyPrefix::session_key("FL-1"), vec![0]);
        tx.commit().unwrap();

        let (low, high) = prefix_range(&KeyPrefix::round_updates_prefix("FL-1", 10));
        let keys: Vec<String> = ledger
            .range_scan(&low, &high)
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(
            keys,
            vec![
                KeyPrefix::update_key("FL-1", 10, "org1"),
                KeyPrefix::update_key("FL-1", 10, "org2"),
            ]
        );

        let (low, high) = prefix_range(&KeyPrefix::session_updates_prefix("FL-1"));
        let rounds: Vec<u8> = ledger
            .range_scan(&low, &high)
            .map(|entry| entry.unwrap().1.value[0])
            .collect();
        assert_eq!(rounds, vec![1, 1, 9, 9, 10, 10, 11, 11]);
    }

    #[test]
    fn test_closed_scan_yields_nothing_more() {
        let ledger = InMemoryLedger::new();
        let mut tx = LedgerTransaction::begin(&ledger);
        for i in 0..5 {
            tx.put(KeyPrefix::flag_key(&format!("F-{i}")), vec![i]);
        }
        tx.commit().unwrap();

        let (low, high) = KeyPrefix::Flag.family_range();
        let mut scan = ledger.range_scan(&low, &high).with_page_size(2);
        assert!(scan.next().is_some());
        scan.close();
        assert!(scan.is_closed());
        assert!(scan.next().is_none());
    }
}
