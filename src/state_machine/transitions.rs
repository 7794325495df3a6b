//! Pure transition rules for the shipment lifecycle.
//!
//! ```text
//! PENDING ──► IN_TRANSIT ──► DELIVERED
//!    │             │
//!    └─────────────┴──────► ERROR
//! ```

use super::states::ShipmentStatus;

/// Successor of `current` on the delivery path.
///
/// Non-terminal statuses always have a successor; terminal statuses are
/// fixed points and come back unchanged.
pub fn next_status(current: ShipmentStatus) -> ShipmentStatus {
    match current {
        ShipmentStatus::Pending => ShipmentStatus::InTransit,
        ShipmentStatus::InTransit => ShipmentStatus::Delivered,
        ShipmentStatus::Delivered | ShipmentStatus::Error => current,
    }
}

/// Whether moving from `from` to `to` is a legal status change.
///
/// Forward moves along the delivery path are legal (a carrier may report
/// delivery before ever reporting transit), and any non-terminal status may
/// fall into `ERROR`. Terminal statuses admit nothing, and a status is never
/// a transition to itself.
pub fn can_transition(from: ShipmentStatus, to: ShipmentStatus) -> bool {
    if from.is_terminal() || from == to {
        return false;
    }

    match (from.progress_rank(), to.progress_rank()) {
        (Some(from_rank), Some(to_rank)) => to_rank > from_rank,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}
