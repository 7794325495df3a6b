//! # Status Source
//!
//! Pluggable capability that decides a shipment's next status. Production
//! deployments back this with a carrier tracking API; the deterministic
//! [`MockStatusSource`] walks the delivery path one step per call.
//!
//! Implementations receive the worker's cancellation token and should return
//! promptly (with a lookup error) once it fires. They are never interrupted
//! forcibly.

use crate::error::Result;
use crate::models::Shipment;
use crate::state_machine::{next_status, ShipmentStatus};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Next status for `shipment`, or its current status when nothing changed.
    async fn next_status(
        &self,
        shipment: &Shipment,
        cancel: &CancellationToken,
    ) -> Result<ShipmentStatus>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Deterministic policy: PENDING -> IN_TRANSIT -> DELIVERED, terminal
/// statuses unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStatusSource;

#[async_trait]
impl StatusSource for MockStatusSource {
    async fn next_status(
        &self,
        shipment: &Shipment,
        _cancel: &CancellationToken,
    ) -> Result<ShipmentStatus> {
        Ok(next_status(shipment.status))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_mock_source_walks_delivery_path() {
        let source = MockStatusSource;
        let cancel = CancellationToken::new();
        let shipment = Shipment::new_pending(1, 1, "BR1", "correios", Utc::now());

        let next = source.next_status(&shipment, &cancel).await.unwrap();
        assert_eq!(next, ShipmentStatus::InTransit);

        let in_transit = shipment.with_status(ShipmentStatus::InTransit);
        let next = source.next_status(&in_transit, &cancel).await.unwrap();
        assert_eq!(next, ShipmentStatus::Delivered);

        for terminal in [ShipmentStatus::Delivered, ShipmentStatus::Error] {
            let fixed = in_transit.clone().with_status(terminal);
            let next = source.next_status(&fixed, &cancel).await.unwrap();
            assert_eq!(next, terminal);
        }
    }
}
