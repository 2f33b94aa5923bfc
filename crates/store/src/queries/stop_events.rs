use model::stop_event::StopEvent;
use sqlx::{Executor, Postgres};

use crate::convert_error;

const CHUNK_SIZE: usize = 200;

/// Bulk-inserts a batch of stop events, skipping any row whose
/// `(trip_id, service_date, stop_sequence)` key already exists. This is the
/// exactly-once guarantee's last line of defense: the in-process saved-set
/// keeps the detector from re-emitting, and this constraint keeps a restart
/// or a duplicated message from producing a duplicate row.
pub async fn insert_batch<'c, E>(executor: E, events: &[StopEvent]) -> crate::Result<u64>
where
    E: Executor<'c, Database = Postgres> + Copy,
{
    let mut total = 0u64;

    for chunk in events.chunks(CHUNK_SIZE) {
        if chunk.is_empty() {
            continue;
        }

        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO stop_events (
                agency, trip_id, service_date, stop_sequence, stop_id, line_number,
                stop_name, stop_desc, direction, headsign, planned_time, event_time,
                delay_seconds, vehicle_id, license_plate, detection_method, is_estimated,
                static_hash, created_at
            ) ",
        );
        builder.push_values(chunk, |mut row, event| {
            row.push_bind(event.agency.as_str())
                .push_bind(&event.trip_id)
                .push_bind(event.service_date)
                .push_bind(event.stop_sequence)
                .push_bind(&event.stop_id)
                .push_bind(&event.line_number)
                .push_bind(&event.stop_name)
                .push_bind(&event.stop_desc)
                .push_bind(event.direction.map(|d| d as i16))
                .push_bind(&event.headsign)
                .push_bind(event.planned_time)
                .push_bind(event.event_time)
                .push_bind(event.delay_seconds)
                .push_bind(&event.vehicle_id)
                .push_bind(&event.license_plate)
                .push_bind(event.detection_method as i16)
                .push_bind(event.is_estimated)
                .push_bind(&event.static_hash)
                .push_bind(event.created_at);
        });
        builder.push(" ON CONFLICT (trip_id, service_date, stop_sequence) DO NOTHING");

        let result = builder
            .build()
            .execute(executor)
            .await
            .map_err(convert_error)?;
        total += result.rows_affected();
    }

    Ok(total)
}
