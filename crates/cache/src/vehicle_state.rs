use model::agency::Agency;
use model::cache::VehicleState;
use redis::AsyncCommands;

use crate::{Cache, CacheError, Result};

const TTL_SECONDS: u64 = 3 * 60 * 60;

fn key(agency: &Agency, license_plate: &str) -> String {
    format!("vs:{}:{}", agency.as_str(), license_plate)
}

/// The Detector's single writer/reader for `VehicleState`, keyed by
/// `(agency, license_plate)`.
pub async fn get(
    cache: &Cache,
    agency: &Agency,
    license_plate: &str,
) -> Result<Option<VehicleState>> {
    let mut connection = cache.connection();
    let raw: Option<Vec<u8>> = connection.get(key(agency, license_plate)).await?;
    match raw {
        Some(bytes) => rmp_serde::from_slice(&bytes)
            .map(Some)
            .map_err(|why| CacheError::Encoding(why.to_string())),
        None => Ok(None),
    }
}

pub async fn set(
    cache: &Cache,
    agency: &Agency,
    license_plate: &str,
    state: &VehicleState,
) -> Result<()> {
    let bytes = rmp_serde::to_vec(state).map_err(|why| CacheError::Encoding(why.to_string()))?;
    let mut connection = cache.connection();
    connection
        .set_ex::<_, _, ()>(key(agency, license_plate), bytes, TTL_SECONDS)
        .await?;
    Ok(())
}

/// Removed once a trip completes, so a future position for the same vehicle
/// starts a fresh trip boundary rather than comparing against stale state.
pub async fn delete(cache: &Cache, agency: &Agency, license_plate: &str) -> Result<()> {
    let mut connection = cache.connection();
    connection
        .del::<_, ()>(key(agency, license_plate))
        .await?;
    Ok(())
}
