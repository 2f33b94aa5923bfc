use gtfs::static_feed::StaticFeed;
use model::agency::Agency;
use sqlx::{Postgres, Transaction};

use crate::convert_error;

const CHUNK_SIZE: usize = 500;

/// Replaces one agency's static schedule rows inside a single transaction:
/// delete-then-reload, so readers never observe a half-loaded feed. Does not
/// commit; callers own the transaction's lifetime so the `gtfs_meta` hash can
/// be updated in the same unit of work.
pub async fn replace_agency_feed(
    tx: &mut Transaction<'_, Postgres>,
    agency: &Agency,
    feed: &StaticFeed,
) -> crate::Result<()> {
    sqlx::query("DELETE FROM stop_times WHERE agency = $1")
        .bind(agency.as_str())
        .execute(&mut **tx)
        .await
        .map_err(convert_error)?;
    sqlx::query("DELETE FROM trips WHERE agency = $1")
        .bind(agency.as_str())
        .execute(&mut **tx)
        .await
        .map_err(convert_error)?;
    sqlx::query("DELETE FROM routes WHERE agency = $1")
        .bind(agency.as_str())
        .execute(&mut **tx)
        .await
        .map_err(convert_error)?;
    sqlx::query("DELETE FROM stops WHERE agency = $1")
        .bind(agency.as_str())
        .execute(&mut **tx)
        .await
        .map_err(convert_error)?;

    for chunk in feed.routes.chunks(CHUNK_SIZE) {
        let mut builder =
            sqlx::QueryBuilder::new("INSERT INTO routes (id, agency, line_number) ");
        builder.push_values(chunk, |mut row, route| {
            row.push_bind(route.id.raw())
                .push_bind(agency.as_str())
                .push_bind(&route.line_number);
        });
        builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(convert_error)?;
    }

    for chunk in feed.stops.chunks(CHUNK_SIZE) {
        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO stops (id, agency, name, code, description, latitude, longitude) ",
        );
        builder.push_values(chunk, |mut row, stop| {
            row.push_bind(stop.id.raw())
                .push_bind(agency.as_str())
                .push_bind(&stop.name)
                .push_bind(&stop.code)
                .push_bind(&stop.description)
                .push_bind(stop.latitude)
                .push_bind(stop.longitude);
        });
        builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(convert_error)?;
    }

    for chunk in feed.trips.chunks(CHUNK_SIZE) {
        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO trips (id, agency, route_id, service_id, direction, headsign, shape_id) ",
        );
        builder.push_values(chunk, |mut row, trip| {
            row.push_bind(trip.id.raw())
                .push_bind(agency.as_str())
                .push_bind(trip.route_id.raw())
                .push_bind(&trip.service_id)
                .push_bind(trip.direction.map(|d| d as i16))
                .push_bind(&trip.headsign)
                .push_bind(&trip.shape_id);
        });
        builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(convert_error)?;
    }

    for chunk in feed.stop_times.chunks(CHUNK_SIZE) {
        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO stop_times (agency, trip_id, stop_sequence, stop_id, arrival_seconds, departure_seconds) ",
        );
        builder.push_values(chunk, |mut row, stop_time| {
            row.push_bind(agency.as_str())
                .push_bind(stop_time.trip_id.raw())
                .push_bind(stop_time.stop_sequence)
                .push_bind(stop_time.stop_id.raw())
                .push_bind(stop_time.arrival_seconds)
                .push_bind(stop_time.departure_seconds);
        });
        builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(convert_error)?;
    }

    Ok(())
}
