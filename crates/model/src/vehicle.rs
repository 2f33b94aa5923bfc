use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::agency::Agency;

/// Mirrors `transit_realtime.VehicleStopStatus`. The numeric values match the
/// wire encoding, which is also how the source system's `VehicleStatus`
/// IntEnum keys off `vp.status.value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum VehicleStatus {
    IncomingAt = 0,
    StoppedAt = 1,
    InTransitTo = 2,
}

impl VehicleStatus {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::IncomingAt),
            1 => Some(Self::StoppedAt),
            2 => Some(Self::InTransitTo),
            _ => None,
        }
    }
}

/// One parsed entity from a `VehiclePositions` feed, published on the
/// `vehicle_positions` channel for the detector to consume.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosition {
    pub agency: Agency,
    pub trip_id: String,
    pub vehicle_id: Option<String>,
    pub license_plate: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bearing: Option<f32>,
    pub stop_id: Option<String>,
    pub stop_sequence: Option<i32>,
    pub status: Option<VehicleStatus>,
    pub timestamp: DateTime<Utc>,
}
