//! # Lease Store
//!
//! ## Architecture: Cross-Instance Claiming Without a Lock Manager
//!
//! The lease store is the only shared mutable resource the worker touches.
//! Every worker instance coordinates through two atomic operations:
//!
//! - **Claim**: select up to `limit` non-terminal records whose lease is absent
//!   or expired, least-recently-updated first, and stamp them with
//!   `(holder_id, now + lease_duration)` in the same atomic step. Concurrent
//!   callers never receive overlapping records.
//! - **Commit**: persist the new status, refresh `last_update_at` and clear the
//!   lease.
//!
//! There is no release-on-failure call. A worker that fails or crashes simply
//! leaves its lease to expire, after which the record is claimable again.
//! Lease deadlines are compared using the store's own clock.

pub mod clock;
pub mod memory;
pub mod postgres;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::InMemoryLeaseStore;
pub use postgres::PgLeaseStore;

use crate::error::Result;
use crate::models::{Shipment, ShipmentId};
use crate::state_machine::ShipmentStatus;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_CLAIM_LIMIT: usize = 50;
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(45);
pub const DEFAULT_HOLDER_ID: &str = "worker";

#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically lease a batch of claimable shipments, oldest update first.
    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<Shipment>>;

    /// Persist `status`, refresh the last-update timestamp and clear the lease.
    ///
    /// Fails with `NotFound` when the record no longer exists.
    async fn commit_status(&self, id: ShipmentId, status: ShipmentStatus) -> Result<()>;
}

/// Parameters of one claim call, normalized on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    limit: usize,
    lease_duration: Duration,
    holder_id: String,
}

impl ClaimRequest {
    /// A zero limit, zero lease duration or blank holder id falls back to its
    /// default.
    pub fn new(limit: usize, lease_duration: Duration, holder_id: impl Into<String>) -> Self {
        let holder_id = holder_id.into();
        Self {
            limit: if limit == 0 { DEFAULT_CLAIM_LIMIT } else { limit },
            lease_duration: if lease_duration.is_zero() {
                DEFAULT_LEASE_DURATION
            } else {
                lease_duration
            },
            holder_id: if holder_id.trim().is_empty() {
                DEFAULT_HOLDER_ID.to_string()
            } else {
                holder_id
            },
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }
}

impl Default for ClaimRequest {
    fn default() -> Self {
        Self::new(DEFAULT_CLAIM_LIMIT, DEFAULT_LEASE_DURATION, DEFAULT_HOLDER_ID)
    }
}
