use std::io::Read;

use model::agency::Agency;
use model::gtfs_static::{Route, Stop, StopTime, Trip};
use serde::Deserialize;
use utility::id::Id;
use utility::time::parse_gtfs_time_to_seconds;

#[derive(Debug, Deserialize)]
struct RouteRow {
    route_id: String,
    route_short_name: Option<String>,
    route_long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StopRow {
    stop_id: String,
    stop_name: String,
    stop_code: Option<String>,
    stop_desc: Option<String>,
    stop_lat: Option<f64>,
    stop_lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TripRow {
    route_id: String,
    service_id: String,
    trip_id: String,
    trip_headsign: Option<String>,
    direction_id: Option<u8>,
    shape_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StopTimeRow {
    trip_id: String,
    arrival_time: Option<String>,
    departure_time: Option<String>,
    stop_id: String,
    stop_sequence: i32,
}

/// Parses `routes.txt`, keeping only the columns the detector and writer
/// need. Rows without a usable line label (neither a short nor long name) are
/// dropped and logged rather than aborting the whole load.
pub fn parse_routes<R: Read>(reader: R, agency: &Agency) -> Vec<Route> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize::<RouteRow>()
        .filter_map(|row| match row {
            Ok(row) => {
                let line_number = row
                    .route_short_name
                    .filter(|name| !name.is_empty())
                    .or(row.route_long_name)?;
                Some(Route {
                    id: Id::new(row.route_id),
                    agency: agency.clone(),
                    line_number,
                })
            }
            Err(why) => {
                log::warn!("skipping malformed routes.txt row for {agency}: {why}");
                None
            }
        })
        .collect()
}

pub fn parse_stops<R: Read>(reader: R, agency: &Agency) -> Vec<Stop> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize::<StopRow>()
        .filter_map(|row| match row {
            Ok(row) => Some(Stop {
                id: Id::new(row.stop_id),
                agency: agency.clone(),
                name: row.stop_name,
                code: row.stop_code,
                description: row.stop_desc,
                latitude: row.stop_lat,
                longitude: row.stop_lon,
            }),
            Err(why) => {
                log::warn!("skipping malformed stops.txt row for {agency}: {why}");
                None
            }
        })
        .collect()
}

pub fn parse_trips<R: Read>(reader: R, agency: &Agency) -> Vec<Trip> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize::<TripRow>()
        .filter_map(|row| match row {
            Ok(row) => Some(Trip {
                id: Id::new(row.trip_id),
                agency: agency.clone(),
                route_id: Id::new(row.route_id),
                service_id: row.service_id,
                direction: row.direction_id,
                headsign: row.trip_headsign,
                shape_id: row.shape_id,
            }),
            Err(why) => {
                log::warn!("skipping malformed trips.txt row for {agency}: {why}");
                None
            }
        })
        .collect()
}

/// Parses `stop_times.txt`. A row is dropped (with a warning) if its
/// `arrival_time` is absent or malformed - unlike the other optional columns,
/// the detector's service-date arithmetic has nothing to fall back to
/// without it. `departure_time` falls back to `arrival_time` when blank,
/// which is how GTFS consumers conventionally treat a stop with a single
/// published time.
pub fn parse_stop_times<R: Read>(reader: R, agency: &Agency) -> Vec<StopTime> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize::<StopTimeRow>()
        .filter_map(|row| match row {
            Ok(row) => {
                let arrival_seconds = match row
                    .arrival_time
                    .as_deref()
                    .map(parse_gtfs_time_to_seconds)
                {
                    Some(Ok(seconds)) => seconds,
                    _ => {
                        log::warn!(
                            "skipping stop_times.txt row for {agency}: trip {} seq {} has no usable arrival_time",
                            row.trip_id, row.stop_sequence
                        );
                        return None;
                    }
                };
                let departure_seconds = row
                    .departure_time
                    .as_deref()
                    .and_then(|value| parse_gtfs_time_to_seconds(value).ok())
                    .unwrap_or(arrival_seconds);

                Some(StopTime {
                    trip_id: Id::new(row.trip_id),
                    stop_sequence: row.stop_sequence,
                    stop_id: Id::new(row.stop_id),
                    arrival_seconds,
                    departure_seconds,
                })
            }
            Err(why) => {
                log::warn!("skipping malformed stop_times.txt row for {agency}: {why}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordinary_stop_times() {
        let csv = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,08:00:00,08:00:30,S1,1\n";
        let agency = Agency::from("mpk");
        let rows = parse_stop_times(csv.as_bytes(), &agency);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].arrival_seconds, 8 * 3600);
        assert_eq!(rows[0].departure_seconds, 8 * 3600 + 30);
    }

    #[test]
    fn drops_rows_missing_arrival_time() {
        let csv = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,,,S1,1\n";
        let agency = Agency::from("mpk");
        assert!(parse_stop_times(csv.as_bytes(), &agency).is_empty());
    }

    #[test]
    fn route_without_any_name_is_dropped() {
        let csv = "route_id,route_short_name,route_long_name\nR1,,\n";
        let agency = Agency::from("mpk");
        assert!(parse_routes(csv.as_bytes(), &agency).is_empty());
    }
}
