use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agency::Agency;

/// One stop prediction inside a `TripUpdate`. At least one of `arrival_time`
/// or `departure_time` is always present; entries lacking both, or lacking a
/// `stop_id`, are dropped during parsing.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTimeUpdate {
    pub stop_id: String,
    pub stop_sequence: Option<i32>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
}

/// A parsed `TripUpdate` feed entity: a vehicle's current predictions for the
/// remainder of its trip.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdate {
    pub agency: Agency,
    pub trip_id: String,
    pub vehicle_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub stop_time_updates: Vec<StopTimeUpdate>,
}
