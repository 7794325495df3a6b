//! # Models
//!
//! Data shapes the worker reads from and writes to shared storage.

pub mod shipment;

pub use shipment::{Lease, Shipment, ShipmentId, ShipmentRow};
