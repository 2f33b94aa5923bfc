//! Parsing of GTFS-Realtime `VehiclePositions` and `TripUpdates` feeds into
//! the crate's own [`model`] types.
//!
//! Both parsers are deliberately forgiving: a feed is produced by a vendor
//! system outside our control, and a single malformed entity must never take
//! down the poller. Bad entities are dropped and logged; a feed that fails to
//! decode at all yields an empty result rather than an error that would halt
//! the poll loop.

use chrono::{DateTime, Utc};
use model::agency::Agency;
use model::trip_update::{StopTimeUpdate, TripUpdate};
use model::vehicle::{VehicleStatus, VehiclePosition};
use prost::Message;

use crate::protobuf::{trip_update::StopTimeEvent, FeedMessage};

/// Payloads shorter than this cannot possibly contain a valid `FeedMessage`
/// and are treated as an empty feed rather than attempted to decode.
pub const PB_MIN_PAYLOAD_BYTES: usize = 10;

/// How many leading bytes of an undecodable `TripUpdates` payload to log, to
/// help diagnose a misbehaving feed without dumping the whole thing.
const HEX_PREVIEW_BYTES: usize = 50;

pub fn parse_vehicle_positions(pb_data: &[u8], agency: &Agency) -> Vec<VehiclePosition> {
    if pb_data.len() < PB_MIN_PAYLOAD_BYTES {
        return Vec::new();
    }

    let message = match FeedMessage::decode(pb_data) {
        Ok(message) => message,
        Err(_) => return Vec::new(),
    };

    message
        .entity
        .into_iter()
        .filter_map(|entity| {
            let vehicle = entity.vehicle?;
            let trip_id = vehicle.trip.as_ref()?.trip_id.clone()?;
            if trip_id.is_empty() {
                return None;
            }
            let license_plate = vehicle
                .vehicle
                .as_ref()
                .and_then(|descriptor| descriptor.license_plate.clone())
                .filter(|plate| !plate.is_empty())?;
            let timestamp = vehicle.timestamp.filter(|ts| *ts > 0)?;
            let timestamp = DateTime::<Utc>::from_timestamp(timestamp as i64, 0)?;

            Some(VehiclePosition {
                agency: agency.clone(),
                trip_id,
                vehicle_id: vehicle.vehicle.as_ref().and_then(|d| d.id.clone()),
                license_plate,
                latitude: vehicle.position.as_ref().map(|p| p.latitude as f64),
                longitude: vehicle.position.as_ref().map(|p| p.longitude as f64),
                bearing: vehicle.position.as_ref().and_then(|p| p.bearing),
                stop_id: vehicle.stop_id.clone(),
                stop_sequence: vehicle.current_stop_sequence.map(|seq| seq as i32),
                status: vehicle.current_status.and_then(VehicleStatus::from_i32),
                timestamp,
            })
        })
        .collect()
}

pub fn parse_trip_updates(pb_data: &[u8], agency: &Agency) -> Vec<TripUpdate> {
    if pb_data.len() < PB_MIN_PAYLOAD_BYTES {
        log::warn!(
            "trip updates payload for {agency} is only {} bytes, treating as empty",
            pb_data.len()
        );
        return Vec::new();
    }

    let message = match FeedMessage::decode(pb_data) {
        Ok(message) => message,
        Err(why) => {
            let preview_len = pb_data.len().min(HEX_PREVIEW_BYTES);
            log::error!(
                "failed to decode trip updates for {agency}: {why}; first {} bytes: {}",
                preview_len,
                hex_preview(&pb_data[..preview_len])
            );
            return Vec::new();
        }
    };

    let header_timestamp = message.header.timestamp;

    message
        .entity
        .into_iter()
        .filter_map(|entity| {
            let trip_update = entity.trip_update?;
            let trip_id = trip_update.trip.trip_id.clone()?;
            if trip_id.is_empty() {
                return None;
            }

            let timestamp = trip_update
                .timestamp
                .or(header_timestamp)
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0))?;

            let stop_time_updates: Vec<StopTimeUpdate> = trip_update
                .stop_time_update
                .into_iter()
                .filter_map(|stu| {
                    let stop_id = stu.stop_id.clone().filter(|id| !id.is_empty())?;
                    let arrival_time = extract_time(stu.arrival.as_ref());
                    let departure_time = extract_time(stu.departure.as_ref());
                    if arrival_time.is_none() && departure_time.is_none() {
                        return None;
                    }
                    Some(StopTimeUpdate {
                        stop_id,
                        stop_sequence: stu.stop_sequence.map(|seq| seq as i32),
                        arrival_time,
                        departure_time,
                    })
                })
                .collect();

            if stop_time_updates.is_empty() {
                return None;
            }

            Some(TripUpdate {
                agency: agency.clone(),
                trip_id,
                vehicle_id: trip_update.vehicle.as_ref().and_then(|d| d.id.clone()),
                timestamp,
                stop_time_updates,
            })
        })
        .collect()
}

fn extract_time(event: Option<&StopTimeEvent>) -> Option<DateTime<Utc>> {
    event
        .and_then(|event| event.time)
        .and_then(|time| DateTime::<Utc>::from_timestamp(time, 0))
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undersized_payload_yields_no_vehicle_positions() {
        let agency = Agency::from("mpk");
        assert!(parse_vehicle_positions(&[0u8; 3], &agency).is_empty());
    }

    #[test]
    fn undersized_payload_yields_no_trip_updates() {
        let agency = Agency::from("mpk");
        assert!(parse_trip_updates(&[0u8; 3], &agency).is_empty());
    }

    #[test]
    fn garbage_payload_does_not_panic() {
        let agency = Agency::from("mpk");
        let garbage = vec![0xffu8; 64];
        assert!(parse_vehicle_positions(&garbage, &agency).is_empty());
        assert!(parse_trip_updates(&garbage, &agency).is_empty());
    }
}
