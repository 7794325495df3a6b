//! In-memory lease store.
//!
//! Implements the same claim/commit semantics as the PostgreSQL store behind
//! a single mutex, so a claim is atomic with respect to every other caller in
//! the process. Used for tests, demos and single-process deployments.

use super::clock::{Clock, SystemClock};
use super::{ClaimRequest, LeaseStore};
use crate::error::{Result, ShiptrackError};
use crate::models::{Lease, Shipment, ShipmentId};
use crate::state_machine::ShipmentStatus;
use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct InMemoryLeaseStore {
    records: Mutex<BTreeMap<ShipmentId, Shipment>>,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    commits: AtomicUsize,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            clock,
            next_id: AtomicU64::new(1),
            commits: AtomicUsize::new(0),
        }
    }

    /// Register a new `PENDING` shipment and return its id.
    pub fn register(&self, user_id: i64, code: &str, carrier: &str) -> ShipmentId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as ShipmentId;
        let shipment = Shipment::new_pending(id, user_id, code, carrier, self.clock.now());
        self.records.lock().insert(id, shipment);
        id
    }

    /// Insert or replace a record as-is.
    pub fn insert(&self, shipment: Shipment) {
        let id = shipment.id;
        self.next_id
            .fetch_max(id.saturating_add(1).max(1) as u64, Ordering::SeqCst);
        self.records.lock().insert(id, shipment);
    }

    pub fn remove(&self, id: ShipmentId) -> Option<Shipment> {
        self.records.lock().remove(&id)
    }

    pub fn get(&self, id: ShipmentId) -> Option<Shipment> {
        self.records.lock().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Shipment> {
        self.records.lock().values().cloned().collect()
    }

    pub fn count_with_status(&self, status: ShipmentStatus) -> usize {
        self.records
            .lock()
            .values()
            .filter(|s| s.status == status)
            .count()
    }

    /// Number of successful status commits since creation.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLeaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLeaseStore")
            .field("records", &self.records.lock().len())
            .field("commits", &self.commit_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    #[instrument(skip(self, request), fields(holder_id = %request.holder_id(), limit = request.limit()))]
    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<Shipment>> {
        let lease_duration = Duration::from_std(request.lease_duration()).map_err(|e| {
            ShiptrackError::store_unavailable(format!("lease duration out of range: {e}"))
        })?;

        let mut records = self.records.lock();
        let now = self.clock.now();

        let mut candidates: Vec<&mut Shipment> = records
            .values_mut()
            .filter(|s| s.is_claimable_at(now))
            .collect();
        candidates.sort_by_key(|s| (s.last_update_at, s.id));

        let held_until = now.checked_add_signed(lease_duration).ok_or_else(|| {
            ShiptrackError::store_unavailable("lease deadline out of range")
        })?;
        let claimed: Vec<Shipment> = candidates
            .into_iter()
            .take(request.limit())
            .map(|shipment| {
                shipment.lease = Some(Lease {
                    holder_id: request.holder_id().to_string(),
                    held_until,
                });
                shipment.clone()
            })
            .collect();

        debug!(claimed = claimed.len(), "Claimed shipments from memory");
        Ok(claimed)
    }

    #[instrument(skip(self))]
    async fn commit_status(&self, id: ShipmentId, status: ShipmentStatus) -> Result<()> {
        let mut records = self.records.lock();
        let now = self.clock.now();

        let shipment = records
            .get_mut(&id)
            .ok_or(ShiptrackError::NotFound { shipment_id: id })?;
        shipment.status = status;
        shipment.last_update_at = now;
        shipment.lease = None;

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
