//! # Error Types
//!
//! Structured error handling for the status-advancement worker using thiserror.
//!
//! Nothing here is fatal to the worker process: lookup failures, vanished
//! records and store outages are all skipped, and the lease expiry on the
//! affected records drives the retry.

use crate::state_machine::ShipmentStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShiptrackError {
    /// The status source could not produce a next status for this tick.
    #[error("Status lookup failed for shipment {shipment_id}: {message}")]
    Lookup { shipment_id: i64, message: String },

    /// The record disappeared between claim and commit.
    #[error("Shipment not found: {shipment_id}")]
    NotFound { shipment_id: i64 },

    #[error("Lease store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Illegal status transition for shipment {shipment_id}: {from} -> {to}")]
    IllegalTransition {
        shipment_id: i64,
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ShiptrackError {
    pub fn lookup(shipment_id: i64, message: impl Into<String>) -> Self {
        Self::Lookup {
            shipment_id,
            message: message.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Failures that clear up on their own once the lease expires and the
    /// record is claimed again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Lookup { .. } | Self::StoreUnavailable { .. } | Self::IllegalTransition { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for ShiptrackError {
    fn from(err: sqlx::Error) -> Self {
        Self::store_unavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for ShiptrackError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::store_unavailable(format!("migration failed: {err}"))
    }
}

impl From<config::ConfigError> for ShiptrackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShiptrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ShiptrackError::lookup(1, "carrier timeout").is_transient());
        assert!(ShiptrackError::store_unavailable("connection refused").is_transient());
        assert!(!ShiptrackError::NotFound { shipment_id: 1 }.is_transient());
        assert!(ShiptrackError::NotFound { shipment_id: 1 }.is_not_found());
        assert!(!ShiptrackError::Configuration("bad".into()).is_transient());
    }

    #[test]
    fn test_sqlx_errors_map_to_store_unavailable() {
        let err: ShiptrackError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ShiptrackError::StoreUnavailable { .. }));
        assert!(!err.is_not_found());

        let err: ShiptrackError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ShiptrackError::IllegalTransition {
            shipment_id: 9,
            from: ShipmentStatus::Delivered,
            to: ShipmentStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Illegal status transition for shipment 9: DELIVERED -> PENDING"
        );

        let err = ShiptrackError::lookup(3, "503 from carrier");
        assert_eq!(
            err.to_string(),
            "Status lookup failed for shipment 3: 503 from carrier"
        );
    }
}
