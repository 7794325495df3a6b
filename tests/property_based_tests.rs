mod common;

use chrono::{TimeZone, Utc};
use common::strategies::*;
use proptest::prelude::*;
use shiptrack::lease_store::{ClaimRequest, InMemoryLeaseStore, LeaseStore, ManualClock};
use shiptrack::state_machine::{can_transition, next_status, ShipmentStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    /// Property: Terminal statuses admit no transition at all
    #[test]
    fn terminal_statuses_are_fixed_points(from in status_strategy(), to in status_strategy()) {
        if from.is_terminal() {
            prop_assert!(!can_transition(from, to));
            prop_assert_eq!(next_status(from), from);
        }
    }

    /// Property: A status is never a transition to itself
    #[test]
    fn self_moves_are_not_transitions(status in status_strategy()) {
        prop_assert!(!can_transition(status, status));
    }

    /// Property: Every proposal of the mock policy is an accepted transition
    #[test]
    fn mock_policy_only_proposes_legal_moves(status in status_strategy()) {
        let next = next_status(status);
        if next != status {
            prop_assert!(can_transition(status, next), "{} -> {} rejected", status, next);
        }
    }

    /// Property: Any active status reaches a terminal one within two steps
    #[test]
    fn mock_policy_terminates(status in status_strategy()) {
        let reached = next_status(next_status(status));
        prop_assert!(reached.is_terminal());
    }

    /// Property: Accepted transitions never move back along the delivery path
    #[test]
    fn transitions_never_regress(from in status_strategy(), to in status_strategy()) {
        if can_transition(from, to) {
            prop_assert!(!from.is_terminal());
            prop_assert!(to == ShipmentStatus::Error || to > from);
        }
    }

    /// Property: Successive claims hand out disjoint, claimable records in
    /// least-recently-updated order until none remain
    #[test]
    fn successive_claims_are_disjoint_and_ordered(
        shipments in shipments_strategy(60),
        limit in 1usize..=20,
    ) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 2, 0, 0).unwrap(),
        ));
        let store = InMemoryLeaseStore::with_clock(clock);
        for shipment in &shipments {
            store.insert(shipment.clone());
        }
        let claimable = shipments.iter().filter(|s| !s.status.is_terminal()).count();

        let batches = tokio_test::block_on(async {
            let mut batches = Vec::new();
            for round in 0.. {
                let request =
                    ClaimRequest::new(limit, Duration::from_secs(45), format!("worker-{round}"));
                let batch = store.claim_batch(&request).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                batches.push(batch);
            }
            batches
        });

        let mut seen = HashSet::new();
        let mut previous = None;
        for batch in &batches {
            prop_assert!(batch.len() <= limit);
            for shipment in batch {
                prop_assert!(!shipment.status.is_terminal());
                prop_assert!(seen.insert(shipment.id), "id {} claimed twice", shipment.id);
                let key = (shipment.last_update_at, shipment.id);
                if let Some(prev) = previous {
                    prop_assert!(prev < key);
                }
                previous = Some(key);
            }
        }
        prop_assert_eq!(seen.len(), claimable);
    }
}
