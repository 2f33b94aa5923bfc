use chrono::{DateTime, Utc};
use futures::StreamExt;
use model::agency::Agency;
use model::vehicle::VehiclePosition;
use serde::{Deserialize, Serialize};

use crate::{Cache, CacheError, Result};

pub const CHANNEL: &str = "vehicle_positions";

/// The subset of a `VehiclePosition` actually broadcast on the channel.
/// Position (`lat`/`lon`/`bearing`) is intentionally left out: the Detector
/// never needs it, so it never crosses the wire.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePositionMessage {
    pub agency: Agency,
    pub trip_id: String,
    pub vehicle_id: Option<String>,
    pub license_plate: String,
    pub stop_id: Option<String>,
    pub stop_sequence: Option<i32>,
    pub status: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl From<&VehiclePosition> for VehiclePositionMessage {
    fn from(position: &VehiclePosition) -> Self {
        Self {
            agency: position.agency.clone(),
            trip_id: position.trip_id.clone(),
            vehicle_id: position.vehicle_id.clone(),
            license_plate: position.license_plate.clone(),
            stop_id: position.stop_id.clone(),
            stop_sequence: position.stop_sequence,
            status: position.status.map(|status| status as i32),
            timestamp: position.timestamp,
        }
    }
}

/// Publishes one vehicle position to the `vehicle_positions` channel. Returns
/// the number of subscribers that received it, matching `PUBLISH`'s own
/// return value.
pub async fn publish(cache: &Cache, position: &VehiclePosition) -> Result<i64> {
    let message = VehiclePositionMessage::from(position);
    let payload =
        serde_json::to_string(&message).map_err(|why| CacheError::Encoding(why.to_string()))?;

    let mut connection = cache.connection();
    let receivers: i64 = redis::cmd("PUBLISH")
        .arg(CHANNEL)
        .arg(payload)
        .query_async(&mut connection)
        .await?;
    Ok(receivers)
}

/// Subscribes to `vehicle_positions` and invokes `on_message` for every
/// payload that parses. A message that fails to parse is logged and skipped
/// rather than killing the subscription loop.
pub async fn subscribe(
    info: &crate::ConnectionInfo,
    mut on_message: impl FnMut(VehiclePositionMessage),
) -> Result<()> {
    let client = redis::Client::open(info.redis_url())?;
    let connection = client.get_async_connection().await?;
    let mut pubsub = connection.into_pubsub();
    pubsub.subscribe(CHANNEL).await?;

    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(why) => {
                log::warn!("dropping non-utf8 vehicle_positions payload: {why}");
                continue;
            }
        };

        match serde_json::from_str::<VehiclePositionMessage>(&payload) {
            Ok(parsed) => on_message(parsed),
            Err(why) => log::warn!("dropping malformed vehicle_positions payload: {why}"),
        }
    }

    Ok(())
}
