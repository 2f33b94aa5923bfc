use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::agency::Agency;

/// A scheduled line, as published in `routes.txt`.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(skip)]
    pub id: Id<Route>,
    pub agency: Agency,
    pub line_number: String,
}

impl HasId for Route {
    type IdType = String;
}

/// A physical stop, as published in `stops.txt`.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    #[serde(skip)]
    pub id: Id<Stop>,
    pub agency: Agency,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl HasId for Stop {
    type IdType = String;
}

/// One scheduled run of a vehicle, as published in `trips.txt`.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    #[serde(skip)]
    pub id: Id<Trip>,
    pub agency: Agency,
    pub route_id: Id<Route>,
    pub service_id: String,
    pub direction: Option<u8>,
    pub headsign: Option<String>,
    pub shape_id: Option<String>,
}

impl HasId for Trip {
    type IdType = String;
}

/// A single row of `stop_times.txt`: the `stop_sequence`-th stop visited by a
/// trip. `arrival_seconds`/`departure_seconds` are seconds since the service
/// day's midnight and may exceed 86400 for overnight trips.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTime {
    pub trip_id: Id<Trip>,
    pub stop_sequence: i32,
    pub stop_id: Id<Stop>,
    pub arrival_seconds: i64,
    pub departure_seconds: i64,
}

/// Per-agency static-schedule change tracking, mirroring the relational
/// `gtfs_meta` table: the SHA-256 hash of the last zip payload successfully
/// loaded, so importer cycles can skip a reload when nothing changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GtfsMeta {
    pub agency: Agency,
    pub current_hash: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
