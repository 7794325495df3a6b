use serde::{Deserialize, Serialize};
use std::fmt;

/// Shipment lifecycle status as stored in the `shipments.status` column
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    /// Initial status when the shipment is registered
    #[default]
    Pending,
    /// Carrier has picked the parcel up
    InTransit,
    /// Parcel handed to the recipient
    Delivered,
    /// Carrier reported an unrecoverable problem
    Error,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 4] = [
        Self::Pending,
        Self::InTransit,
        Self::Delivered,
        Self::Error,
    ];

    /// Statuses the worker still claims and advances.
    pub const ACTIVE: [ShipmentStatus; 2] = [Self::Pending, Self::InTransit];

    /// Check if this is a terminal status (never claimed, never transitioned)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Error)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Error => "ERROR",
        }
    }

    /// Position along the delivery path. `Error` sits outside it.
    pub(crate) fn progress_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::InTransit => Some(1),
            Self::Delivered => Some(2),
            Self::Error => None,
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "DELIVERED" => Ok(Self::Delivered),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("Invalid shipment status: {s}")),
        }
    }
}
