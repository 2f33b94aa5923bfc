use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::agency::Agency;

/// How a `StopEvent` was derived. `IncomingAt` is reserved: the detector never
/// emits it today, but the variant is kept so a future detection strategy
/// (and its storage) does not require a schema migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum DetectionMethod {
    StoppedAt = 0,
    SeqJump = 1,
    Timeout = 2,
    IncomingAt = 3,
}

/// One observed (or inferred) arrival at a scheduled stop. The unique key is
/// `(trip_id, service_date, stop_sequence)`; everything else is descriptive.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEvent {
    pub agency: Agency,
    pub trip_id: String,
    pub service_date: NaiveDate,
    pub stop_sequence: i32,
    pub stop_id: String,
    pub line_number: String,
    pub stop_name: String,
    pub stop_desc: Option<String>,
    pub direction: Option<u8>,
    pub headsign: Option<String>,
    pub planned_time: DateTime<Utc>,
    pub event_time: DateTime<Utc>,
    pub delay_seconds: i32,
    pub vehicle_id: Option<String>,
    pub license_plate: String,
    pub detection_method: DetectionMethod,
    pub is_estimated: bool,
    pub static_hash: String,
    pub created_at: DateTime<Utc>,
}
