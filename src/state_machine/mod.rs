// Shipment status machine
//
// Pure logic only: the status enum and the rules for which changes are legal.
// Anything requiring a carrier lookup lives behind `status_source::StatusSource`.

pub mod states;
pub mod transitions;

pub use states::ShipmentStatus;
pub use transitions::{can_transition, next_status};
