//! # Shipment Model
//!
//! Transient copy of a tracked shipment as the worker sees it.
//!
//! ## Database Schema
//!
//! Maps to the `shipments` table. The worker only ever reads every column and
//! writes the lifecycle ones:
//! - `status`: `PENDING` / `IN_TRANSIT` / `DELIVERED` / `ERROR` (TEXT)
//! - `last_update_at`: refreshed on every status commit (TIMESTAMPTZ)
//! - `leased_until` / `leased_by`: the lease, both NULL when unleased
//!
//! The storage layer owns the authoritative record. A `Shipment` held by the
//! worker is a snapshot taken at claim time and is never written back whole.

use crate::error::{Result, ShiptrackError};
use crate::state_machine::ShipmentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type ShipmentId = i64;

/// A tracked shipment together with its lease, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub user_id: i64,
    /// Carrier tracking code
    pub code: String,
    pub carrier: String,
    pub status: ShipmentStatus,
    pub last_update_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub lease: Option<Lease>,
}

/// Time-bounded exclusive claim held by one worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub holder_id: String,
    pub held_until: DateTime<Utc>,
}

impl Lease {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.held_until < now
    }
}

impl Shipment {
    /// Build a freshly registered, unleased `PENDING` shipment.
    pub fn new_pending(
        id: ShipmentId,
        user_id: i64,
        code: impl Into<String>,
        carrier: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            code: code.into(),
            carrier: carrier.into(),
            status: ShipmentStatus::Pending,
            last_update_at: now,
            created_at: now,
            lease: None,
        }
    }

    pub fn with_status(mut self, status: ShipmentStatus) -> Self {
        self.status = status;
        self
    }

    /// A record is claimable when its status is non-terminal and it holds no
    /// live lease at `now`.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match &self.lease {
            None => true,
            Some(lease) => lease.is_expired_at(now),
        }
    }
}

/// Raw row shape returned by the PostgreSQL store.
#[derive(Debug, Clone, FromRow)]
pub struct ShipmentRow {
    pub id: i64,
    pub user_id: i64,
    pub code: String,
    pub carrier: String,
    pub status: String,
    pub last_update_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub leased_until: Option<DateTime<Utc>>,
    pub leased_by: Option<String>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = ShiptrackError;

    fn try_from(row: ShipmentRow) -> Result<Self> {
        let status = row.status.parse::<ShipmentStatus>().map_err(|e| {
            ShiptrackError::store_unavailable(format!("shipment {}: {e}", row.id))
        })?;

        let lease = match (row.leased_by, row.leased_until) {
            (Some(holder_id), Some(held_until)) => Some(Lease {
                holder_id,
                held_until,
            }),
            _ => None,
        };

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            code: row.code,
            carrier: row.carrier,
            status,
            last_update_at: row.last_update_at,
            created_at: row.created_at,
            lease,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claimable_window() {
        let now = Utc::now();
        let mut shipment = Shipment::new_pending(1, 1, "BR123", "correios", now);
        assert!(shipment.is_claimable_at(now));

        shipment.lease = Some(Lease {
            holder_id: "worker".to_string(),
            held_until: now + Duration::seconds(45),
        });
        assert!(!shipment.is_claimable_at(now));
        assert!(shipment.is_claimable_at(now + Duration::seconds(46)));

        let delivered = shipment.with_status(ShipmentStatus::Delivered);
        assert!(!delivered.is_claimable_at(now + Duration::days(1)));
    }

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = ShipmentRow {
            id: 7,
            user_id: 1,
            code: "AB123".to_string(),
            carrier: "dhl".to_string(),
            status: "IN_TRANSIT".to_string(),
            last_update_at: now,
            created_at: now,
            leased_until: Some(now),
            leased_by: Some("worker-a".to_string()),
        };

        let shipment = Shipment::try_from(row).unwrap();
        assert_eq!(shipment.status, ShipmentStatus::InTransit);
        assert_eq!(shipment.lease.unwrap().holder_id, "worker-a");
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let now = Utc::now();
        let row = ShipmentRow {
            id: 8,
            user_id: 1,
            code: "AB124".to_string(),
            carrier: "dhl".to_string(),
            status: "LOST".to_string(),
            last_update_at: now,
            created_at: now,
            leased_until: None,
            leased_by: None,
        };

        assert!(Shipment::try_from(row).is_err());
    }
}
