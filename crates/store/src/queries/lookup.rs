use std::collections::HashMap;

use model::agency::Agency;
use model::gtfs_static::{Route, Stop, StopTime, Trip};
use sqlx::{Executor, FromRow, Postgres};
use utility::id::Id;

use crate::convert_error;

#[derive(FromRow)]
struct TripRow {
    id: String,
    agency: String,
    route_id: String,
    service_id: String,
    direction: Option<i16>,
    headsign: Option<String>,
    shape_id: Option<String>,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        Trip {
            id: Id::new(row.id),
            agency: Agency::from(row.agency),
            route_id: Id::new(row.route_id),
            service_id: row.service_id,
            direction: row.direction.map(|d| d as u8),
            headsign: row.headsign,
            shape_id: row.shape_id,
        }
    }
}

#[derive(FromRow)]
struct StopRow {
    id: String,
    agency: String,
    name: String,
    code: Option<String>,
    description: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<StopRow> for Stop {
    fn from(row: StopRow) -> Self {
        Stop {
            id: Id::new(row.id),
            agency: Agency::from(row.agency),
            name: row.name,
            code: row.code,
            description: row.description,
            latitude: row.latitude,
            longitude: row.longitude,
        }
    }
}

#[derive(FromRow)]
struct RouteRow {
    id: String,
    agency: String,
    line_number: String,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: Id::new(row.id),
            agency: Agency::from(row.agency),
            line_number: row.line_number,
        }
    }
}

#[derive(FromRow)]
struct StopTimeRow {
    trip_id: String,
    stop_sequence: i32,
    stop_id: String,
    arrival_seconds: i64,
    departure_seconds: i64,
}

impl From<StopTimeRow> for StopTime {
    fn from(row: StopTimeRow) -> Self {
        StopTime {
            trip_id: Id::new(row.trip_id),
            stop_sequence: row.stop_sequence,
            stop_id: Id::new(row.stop_id),
            arrival_seconds: row.arrival_seconds,
            departure_seconds: row.departure_seconds,
        }
    }
}

pub async fn get_trip<'c, E>(executor: E, agency: &Agency, trip_id: &str) -> crate::Result<Trip>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, TripRow>(
        "SELECT id, agency, route_id, service_id, direction, headsign, shape_id
         FROM trips WHERE agency = $1 AND id = $2",
    )
    .bind(agency.as_str())
    .bind(trip_id)
    .fetch_one(executor)
    .await
    .map(Trip::from)
    .map_err(convert_error)
}

pub async fn get_route<'c, E>(
    executor: E,
    agency: &Agency,
    route_id: &str,
) -> crate::Result<Route>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, RouteRow>(
        "SELECT id, agency, line_number FROM routes WHERE agency = $1 AND id = $2",
    )
    .bind(agency.as_str())
    .bind(route_id)
    .fetch_one(executor)
    .await
    .map(Route::from)
    .map_err(convert_error)
}

pub async fn get_stop<'c, E>(executor: E, agency: &Agency, stop_id: &str) -> crate::Result<Stop>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, StopRow>(
        "SELECT id, agency, name, code, description, latitude, longitude
         FROM stops WHERE agency = $1 AND id = $2",
    )
    .bind(agency.as_str())
    .bind(stop_id)
    .fetch_one(executor)
    .await
    .map(Stop::from)
    .map_err(convert_error)
}

/// The stop visited at `stop_sequence` by `trip_id`, used by the detector to
/// resolve a reported sequence number into a scheduled stop and time.
pub async fn get_stop_time<'c, E>(
    executor: E,
    agency: &Agency,
    trip_id: &str,
    stop_sequence: i32,
) -> crate::Result<StopTime>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, StopTimeRow>(
        "SELECT trip_id, stop_sequence, stop_id, arrival_seconds, departure_seconds
         FROM stop_times WHERE agency = $1 AND trip_id = $2 AND stop_sequence = $3",
    )
    .bind(agency.as_str())
    .bind(trip_id)
    .bind(stop_sequence)
    .fetch_one(executor)
    .await
    .map(StopTime::from)
    .map_err(convert_error)
}

/// All scheduled stops for `trip_id`, ordered by sequence. Used to detect
/// sequence jumps and trip completion, and to answer the publisher's
/// stop-id-to-sequence lookups.
pub async fn get_stop_times_for_trip<'c, E>(
    executor: E,
    agency: &Agency,
    trip_id: &str,
) -> crate::Result<Vec<StopTime>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, StopTimeRow>(
        "SELECT trip_id, stop_sequence, stop_id, arrival_seconds, departure_seconds
         FROM stop_times WHERE agency = $1 AND trip_id = $2 ORDER BY stop_sequence",
    )
    .bind(agency.as_str())
    .bind(trip_id)
    .fetch_all(executor)
    .await
    .map(|rows| rows.into_iter().map(StopTime::from).collect())
    .map_err(convert_error)
}

/// The highest `stop_sequence` scheduled for `trip_id`, used to recognize
/// trip completion.
pub async fn get_max_sequence<'c, E>(
    executor: E,
    agency: &Agency,
    trip_id: &str,
) -> crate::Result<Option<i32>>
where
    E: Executor<'c, Database = Postgres>,
{
    let row: Option<(Option<i32>,)> = sqlx::query_as(
        "SELECT MAX(stop_sequence) FROM stop_times WHERE agency = $1 AND trip_id = $2",
    )
    .bind(agency.as_str())
    .bind(trip_id)
    .fetch_optional(executor)
    .await
    .map_err(convert_error)?;

    Ok(row.and_then(|(max,)| max))
}

/// Maps every scheduled `stop_id` of `trip_id` to its `stop_sequence`, so the
/// publisher can attach a sequence number to a realtime position update that
/// only reports a stop id.
pub async fn get_stop_id_to_sequence_map<'c, E>(
    executor: E,
    agency: &Agency,
    trip_id: &str,
) -> crate::Result<HashMap<String, i32>>
where
    E: Executor<'c, Database = Postgres>,
{
    let stop_times = get_stop_times_for_trip(executor, agency, trip_id).await?;
    Ok(stop_times
        .into_iter()
        .map(|stop_time| (stop_time.stop_id.raw(), stop_time.stop_sequence))
        .collect())
}
