#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Shiptrack Core
//!
//! Background worker that advances parcel shipments through their lifecycle.
//!
//! ## Overview
//!
//! Every tick the worker claims a batch of non-terminal shipments under a
//! time-limited lease, asks a [`status_source::StatusSource`] for each one's
//! next status and commits accepted changes. Multiple worker processes can run
//! against the same store: a claimed record is invisible to other claimers
//! until its lease is released by a commit or expires.
//!
//! ```text
//! PENDING ──► IN_TRANSIT ──► DELIVERED
//!    │            │
//!    └────────────┴────────► ERROR
//! ```
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Shipment statuses and the transition rules
//! - [`models`] - The shipment record and its lease
//! - [`lease_store`] - Claim/commit protocol (PostgreSQL and in-memory)
//! - [`status_source`] - Where next statuses come from
//! - [`worker`] - Scheduler loop and bounded batch processing
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and event helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shiptrack::config::ConfigManager;
//! use shiptrack::lease_store::PgLeaseStore;
//! use shiptrack::status_source::MockStatusSource;
//! use shiptrack::worker::ShipmentUpdater;
//! use sqlx::PgPool;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let updater = ShipmentUpdater::new(
//!     Arc::new(PgLeaseStore::new(pool)),
//!     Arc::new(MockStatusSource),
//!     config.worker_settings(),
//! );
//! updater.start(CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                       # In-memory store, no database needed
//! cargo test -- --include-ignored  # Also PostgreSQL tests (requires DATABASE_URL)
//! ```

pub mod config;
pub mod error;
pub mod lease_store;
pub mod logging;
pub mod models;
pub mod state_machine;
pub mod status_source;
pub mod worker;

pub use config::{ConfigManager, ShiptrackConfig, WorkerSettings};
pub use error::{Result, ShiptrackError};
pub use lease_store::{ClaimRequest, InMemoryLeaseStore, LeaseStore, PgLeaseStore};
pub use models::{Lease, Shipment, ShipmentId};
pub use state_machine::{can_transition, next_status, ShipmentStatus};
pub use status_source::{MockStatusSource, StatusSource};
pub use worker::{BatchProcessor, BatchReport, SchedulerState, ShipmentUpdater, TickReport};
