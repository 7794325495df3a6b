//! # Shipment Updater
//!
//! Scheduler loop driving the status-advancement worker.
//!
//! ## Lifecycle
//!
//! - [`ShipmentUpdater::start`] switches to `Running` and runs one tick right
//!   away, then one per interval.
//! - Each tick claims a batch, hands it to the [`BatchProcessor`] and waits
//!   for every dispatched item before the next timer tick is considered, so
//!   ticks never overlap.
//! - Cancelling the token stops new ticks. A tick in progress stops
//!   dispatching and drains what it already started; `start` then returns in
//!   the `Stopped` state.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shiptrack::config::WorkerSettings;
//! use shiptrack::lease_store::InMemoryLeaseStore;
//! use shiptrack::status_source::MockStatusSource;
//! use shiptrack::worker::ShipmentUpdater;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let updater = Arc::new(ShipmentUpdater::new(
//!     Arc::new(InMemoryLeaseStore::new()),
//!     Arc::new(MockStatusSource),
//!     WorkerSettings::default(),
//! ));
//! let cancel = CancellationToken::new();
//!
//! let handle = tokio::spawn({
//!     let updater = Arc::clone(&updater);
//!     let cancel = cancel.clone();
//!     async move { updater.start(cancel).await }
//! });
//!
//! cancel.cancel();
//! handle.await.unwrap();
//! # }
//! ```

use super::batch_processor::{BatchProcessor, BatchReport};
use crate::config::{WorkerSettings, DEFAULT_TICK_INTERVAL};
use crate::lease_store::{ClaimRequest, LeaseStore};
use crate::logging::{log_error, log_tick_summary};
use crate::status_source::StatusSource;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// Outcome of one claim-and-process cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub claimed: usize,
    /// The claim itself failed; nothing was processed
    pub claim_failed: bool,
    pub batch: BatchReport,
    pub duration: Duration,
}

pub struct ShipmentUpdater {
    store: Arc<dyn LeaseStore>,
    processor: BatchProcessor,
    settings: WorkerSettings,
    state: RwLock<SchedulerState>,
    ticks_completed: AtomicU64,
}

impl std::fmt::Debug for ShipmentUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipmentUpdater")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("ticks_completed", &self.ticks_completed())
            .finish_non_exhaustive()
    }
}

impl ShipmentUpdater {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        source: Arc<dyn StatusSource>,
        mut settings: WorkerSettings,
    ) -> Self {
        if settings.interval.is_zero() {
            debug!(field = "interval", "Zero tick interval replaced by default");
            settings.interval = DEFAULT_TICK_INTERVAL;
        }

        let processor = BatchProcessor::new(source, Arc::clone(&store), settings.concurrency)
            .with_lookup_timeout(settings.lookup_timeout)
            .with_holder_id(&settings.holder_id);

        Self {
            store,
            processor,
            settings,
            state: RwLock::new(SchedulerState::Stopped),
            ticks_completed: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed.load(Ordering::SeqCst)
    }

    /// Run until `cancel` fires. The first tick runs immediately.
    pub async fn start(&self, cancel: CancellationToken) {
        *self.state.write() = SchedulerState::Running;

        info!(
            holder_id = %self.settings.holder_id,
            interval_ms = self.settings.interval.as_millis() as u64,
            batch_size = self.settings.batch_size,
            concurrency = self.processor.concurrency(),
            "Shipment updater started"
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(&cancel).await;
                }
            }
        }

        *self.state.write() = SchedulerState::Stopped;
        info!(
            holder_id = %self.settings.holder_id,
            ticks_completed = self.ticks_completed(),
            "Shipment updater stopped"
        );
    }

    /// One claim-and-process cycle. A failed claim skips the tick.
    #[instrument(skip(self, cancel), fields(holder_id = %self.settings.holder_id))]
    pub async fn tick(&self, cancel: &CancellationToken) -> TickReport {
        let started = Instant::now();
        let request = ClaimRequest::new(
            self.settings.batch_size,
            self.settings.lease_duration,
            self.settings.holder_id.clone(),
        );

        let mut report = TickReport::default();
        match self.store.claim_batch(&request).await {
            Ok(batch) if batch.is_empty() => {
                debug!("No claimable shipments this tick");
            }
            Ok(batch) => {
                report.claimed = batch.len();
                report.batch = self.processor.process(batch, cancel).await;
            }
            Err(e) => {
                log_error("shipment_updater", "claim_batch", &e.to_string(), None);
                report.claim_failed = true;
            }
        }
        report.duration = started.elapsed();
        self.ticks_completed.fetch_add(1, Ordering::SeqCst);

        if report.claimed > 0 {
            log_tick_summary(
                &self.settings.holder_id,
                report.claimed,
                report.batch.committed,
                report.batch.unchanged,
                report.batch.failed(),
                report.batch.skipped_on_cancel,
                report.duration.as_millis() as u64,
            );
        }

        report
    }
}
