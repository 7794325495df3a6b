//! # Worker
//!
//! The periodic status-advancement loop ([`ShipmentUpdater`]) and the bounded
//! per-tick fan-out it delegates to ([`BatchProcessor`]).

pub mod batch_processor;
pub mod updater;

pub use batch_processor::{BatchProcessor, BatchReport, ItemOutcome};
pub use updater::{SchedulerState, ShipmentUpdater, TickReport};
