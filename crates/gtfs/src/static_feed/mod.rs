pub mod download;
pub mod hashing;
pub mod parse;

use std::fs::File;
use std::path::Path;

use model::agency::Agency;
use model::gtfs_static::{Route, Stop, StopTime, Trip};

use crate::error::GtfsError;

/// The parsed contents of one agency's static feed, ready to be loaded into
/// the relational store in a single replace transaction.
#[derive(Debug, Default)]
pub struct StaticFeed {
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
}

/// Reads the four required GTFS files out of an already-extracted feed
/// directory (see [`download::extract_zip`]).
pub fn load_from_directory(dir: &Path, agency: &Agency) -> Result<StaticFeed, GtfsError> {
    let routes = File::open(dir.join("routes.txt"))
        .map_err(|_| GtfsError::MissingFile("routes.txt"))?;
    let stops =
        File::open(dir.join("stops.txt")).map_err(|_| GtfsError::MissingFile("stops.txt"))?;
    let trips =
        File::open(dir.join("trips.txt")).map_err(|_| GtfsError::MissingFile("trips.txt"))?;
    let stop_times = File::open(dir.join("stop_times.txt"))
        .map_err(|_| GtfsError::MissingFile("stop_times.txt"))?;

    Ok(StaticFeed {
        routes: parse::parse_routes(routes, agency),
        stops: parse::parse_stops(stops, agency),
        trips: parse::parse_trips(trips, agency),
        stop_times: parse::parse_stop_times(stop_times, agency),
    })
}
