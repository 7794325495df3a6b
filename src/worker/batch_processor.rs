//! # Batch Processor
//!
//! Processes one claimed batch with bounded fan-out:
//!
//! ```text
//! batch ─► [Semaphore(N)] ─► spawn(item) ─► StatusSource ─► LeaseStore::commit_status
//!                                 │
//!                                 └──► JoinSet ─► join barrier ─► BatchReport
//! ```
//!
//! The pool lives exactly as long as one call to [`BatchProcessor::process`].
//! Per-item failures are logged and abandoned; the record's lease expires and
//! a later tick claims it again. No failure aborts the batch.

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_LOOKUP_TIMEOUT};
use crate::error::ShiptrackError;
use crate::lease_store::{LeaseStore, DEFAULT_HOLDER_ID};
use crate::logging::{log_error, log_status_transition};
use crate::models::Shipment;
use crate::state_machine::{can_transition, ShipmentStatus};
use crate::status_source::StatusSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// What happened to a single claimed shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Committed {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },
    /// Source reported the current status; no write issued
    Unchanged,
    LookupFailed,
    IllegalTransition,
    CommitFailed,
    NotFound,
}

/// Per-batch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub dispatched: usize,
    pub committed: usize,
    pub unchanged: usize,
    pub lookup_failed: usize,
    pub illegal_transitions: usize,
    pub commit_failed: usize,
    pub not_found: usize,
    /// Items never started because cancellation fired first
    pub skipped_on_cancel: usize,
    pub panicked: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Committed { .. } => self.committed += 1,
            ItemOutcome::Unchanged => self.unchanged += 1,
            ItemOutcome::LookupFailed => self.lookup_failed += 1,
            ItemOutcome::IllegalTransition => self.illegal_transitions += 1,
            ItemOutcome::CommitFailed => self.commit_failed += 1,
            ItemOutcome::NotFound => self.not_found += 1,
        }
    }

    /// Items abandoned to lease expiry.
    pub fn failed(&self) -> usize {
        self.lookup_failed
            + self.illegal_transitions
            + self.commit_failed
            + self.not_found
            + self.panicked
    }

    pub fn finished(&self) -> usize {
        self.committed + self.unchanged + self.failed()
    }
}

pub struct BatchProcessor {
    source: Arc<dyn StatusSource>,
    store: Arc<dyn LeaseStore>,
    concurrency: usize,
    lookup_timeout: Duration,
    holder_id: Arc<str>,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("source", &self.source.name())
            .field("concurrency", &self.concurrency)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("holder_id", &self.holder_id)
            .finish_non_exhaustive()
    }
}

impl BatchProcessor {
    /// A concurrency of zero falls back to the default of 4.
    pub fn new(
        source: Arc<dyn StatusSource>,
        store: Arc<dyn LeaseStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            store,
            concurrency: if concurrency == 0 {
                DEFAULT_CONCURRENCY
            } else {
                concurrency
            },
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            holder_id: Arc::from(DEFAULT_HOLDER_ID),
        }
    }

    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        if !lookup_timeout.is_zero() {
            self.lookup_timeout = lookup_timeout;
        }
        self
    }

    pub fn with_holder_id(mut self, holder_id: &str) -> Self {
        self.holder_id = Arc::from(holder_id);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process every shipment in `batch` with at most `concurrency` in flight,
    /// and return once all dispatched items have finished.
    ///
    /// After `cancel` fires no further items are dispatched; those already
    /// running are left to finish.
    #[instrument(skip(self, batch, cancel), fields(batch_size = batch.len(), concurrency = self.concurrency))]
    pub async fn process(&self, batch: Vec<Shipment>, cancel: &CancellationToken) -> BatchReport {
        let mut report = BatchReport::default();
        if batch.is_empty() {
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight = JoinSet::new();
        let total = batch.len();

        for shipment in batch {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.skipped_on_cancel = total - report.dispatched;
                debug!(
                    skipped = report.skipped_on_cancel,
                    "Cancellation received, leaving remaining items to lease expiry"
                );
                break;
            };

            let source = Arc::clone(&self.source);
            let store = Arc::clone(&self.store);
            let holder_id = Arc::clone(&self.holder_id);
            let cancel = cancel.clone();
            let lookup_timeout = self.lookup_timeout;

            report.dispatched += 1;
            in_flight.spawn(async move {
                let outcome = process_item(
                    source.as_ref(),
                    store.as_ref(),
                    &shipment,
                    &cancel,
                    lookup_timeout,
                    &holder_id,
                )
                .await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(error = %e, "Shipment processing task panicked");
                    report.panicked += 1;
                }
            }
        }

        report
    }
}

/// Look up, validate and commit one shipment. Never fails; every problem is
/// logged and reported as an outcome.
async fn process_item(
    source: &dyn StatusSource,
    store: &dyn LeaseStore,
    shipment: &Shipment,
    cancel: &CancellationToken,
    lookup_timeout: Duration,
    holder_id: &str,
) -> ItemOutcome {
    let lookup = tokio::time::timeout(lookup_timeout, source.next_status(shipment, cancel)).await;

    let next = match lookup {
        Ok(Ok(next)) => next,
        Ok(Err(e)) => {
            warn!(
                shipment_id = shipment.id,
                source = source.name(),
                error = %e,
                "Status lookup failed, abandoning until lease expires"
            );
            return ItemOutcome::LookupFailed;
        }
        Err(_) => {
            let e = ShiptrackError::lookup(
                shipment.id,
                format!("timed out after {}ms", lookup_timeout.as_millis()),
            );
            warn!(shipment_id = shipment.id, source = source.name(), error = %e, "Status lookup timed out");
            return ItemOutcome::LookupFailed;
        }
    };

    if next == shipment.status {
        debug!(shipment_id = shipment.id, status = %next, "Status unchanged, skipping commit");
        return ItemOutcome::Unchanged;
    }

    if !can_transition(shipment.status, next) {
        let e = ShiptrackError::IllegalTransition {
            shipment_id: shipment.id,
            from: shipment.status,
            to: next,
        };
        log_error("batch_processor", "validate_transition", &e.to_string(), Some(shipment.id));
        return ItemOutcome::IllegalTransition;
    }

    match store.commit_status(shipment.id, next).await {
        Ok(()) => {
            log_status_transition(shipment.id, &shipment.carrier, shipment.status, next, holder_id);
            ItemOutcome::Committed {
                from: shipment.status,
                to: next,
            }
        }
        Err(e) if e.is_not_found() => {
            warn!(shipment_id = shipment.id, "Shipment vanished before commit, skipping");
            ItemOutcome::NotFound
        }
        Err(e) => {
            log_error("batch_processor", "commit_status", &e.to_string(), Some(shipment.id));
            ItemOutcome::CommitFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::lease_store::{ClaimRequest, InMemoryLeaseStore};
    use crate::status_source::MockStatusSource;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Fails lookups for a fixed set of ids and otherwise defers to the mock.
    struct FlakySource {
        failing: HashSet<i64>,
    }

    #[async_trait]
    impl StatusSource for FlakySource {
        async fn next_status(
            &self,
            shipment: &Shipment,
            cancel: &CancellationToken,
        ) -> Result<ShipmentStatus> {
            if self.failing.contains(&shipment.id) {
                return Err(ShiptrackError::lookup(shipment.id, "carrier returned 503"));
            }
            MockStatusSource.next_status(shipment, cancel).await
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Always proposes a fixed status.
    struct FixedSource(ShipmentStatus);

    #[async_trait]
    impl StatusSource for FixedSource {
        async fn next_status(
            &self,
            _shipment: &Shipment,
            _cancel: &CancellationToken,
        ) -> Result<ShipmentStatus> {
            Ok(self.0)
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    /// Never answers within any reasonable timeout.
    struct StalledSource;

    #[async_trait]
    impl StatusSource for StalledSource {
        async fn next_status(
            &self,
            shipment: &Shipment,
            _cancel: &CancellationToken,
        ) -> Result<ShipmentStatus> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(shipment.status)
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    async fn claimed(store: &InMemoryLeaseStore, n: usize) -> Vec<Shipment> {
        for i in 0..n {
            store.register(1, &format!("T{i}"), "dhl");
        }
        store.claim_batch(&ClaimRequest::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let processor = BatchProcessor::new(Arc::new(MockStatusSource), store.clone(), 4);

        let report = processor.process(Vec::new(), &CancellationToken::new()).await;
        assert_eq!(report, BatchReport::default());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_concurrency_defaults_to_four() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let processor = BatchProcessor::new(Arc::new(MockStatusSource), store, 0);
        assert_eq!(processor.concurrency(), 4);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_isolated() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let batch = claimed(&store, 10).await;
        let failing_id = batch[3].id;
        let source = FlakySource {
            failing: HashSet::from([failing_id]),
        };
        let processor = BatchProcessor::new(Arc::new(source), store.clone(), 4);

        let report = processor.process(batch, &CancellationToken::new()).await;

        assert_eq!(report.committed, 9);
        assert_eq!(report.lookup_failed, 1);
        assert_eq!(report.finished(), 10);
        let failed = store.get(failing_id).unwrap();
        assert_eq!(failed.status, ShipmentStatus::Pending);
        assert!(failed.lease.is_some(), "lease is left to expire");
    }

    #[tokio::test]
    async fn test_unchanged_status_skips_commit() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let batch = claimed(&store, 3).await;
        let processor =
            BatchProcessor::new(Arc::new(FixedSource(ShipmentStatus::Pending)), store.clone(), 2);

        let report = processor.process(batch, &CancellationToken::new()).await;

        assert_eq!(report.unchanged, 3);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_rejected() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let id = store.register(1, "BACK", "dhl");
        store.commit_status(id, ShipmentStatus::InTransit).await.unwrap();
        let batch = store.claim_batch(&ClaimRequest::default()).await.unwrap();
        let processor =
            BatchProcessor::new(Arc::new(FixedSource(ShipmentStatus::Pending)), store.clone(), 2);

        let report = processor.process(batch, &CancellationToken::new()).await;

        assert_eq!(report.illegal_transitions, 1);
        assert_eq!(store.get(id).unwrap().status, ShipmentStatus::InTransit);
    }

    #[tokio::test]
    async fn test_vanished_record_is_not_found() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let batch = claimed(&store, 2).await;
        store.remove(batch[0].id);
        let processor = BatchProcessor::new(Arc::new(MockStatusSource), store.clone(), 2);

        let report = processor.process(batch, &CancellationToken::new()).await;

        assert_eq!(report.not_found, 1);
        assert_eq!(report.committed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_abandons_item() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let batch = claimed(&store, 2).await;
        let processor = BatchProcessor::new(Arc::new(StalledSource), store.clone(), 2)
            .with_lookup_timeout(Duration::from_millis(100));

        let report = processor.process(batch, &CancellationToken::new()).await;

        assert_eq!(report.lookup_failed, 2);
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch_skips_everything() {
        let store = Arc::new(InMemoryLeaseStore::new());
        let batch = claimed(&store, 5).await;
        let processor = BatchProcessor::new(Arc::new(MockStatusSource), store.clone(), 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = processor.process(batch, &cancel).await;

        assert_eq!(report.dispatched, 0);
        assert_eq!(report.skipped_on_cancel, 5);
        assert_eq!(store.commit_count(), 0);
    }
}
