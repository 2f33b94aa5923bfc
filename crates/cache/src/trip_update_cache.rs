use model::agency::Agency;
use model::cache::TripUpdateCache;
use redis::AsyncCommands;

use crate::{Cache, CacheError, Result};

const TTL_SECONDS: u64 = 3 * 60 * 60;

fn key(agency: &Agency, trip_id: &str) -> String {
    format!("tu:{}:{}", agency.as_str(), trip_id)
}

/// Single writer is the Publisher; the Detector only reads.
pub async fn get(cache: &Cache, agency: &Agency, trip_id: &str) -> Result<Option<TripUpdateCache>> {
    let mut connection = cache.connection();
    let raw: Option<Vec<u8>> = connection.get(key(agency, trip_id)).await?;
    match raw {
        Some(bytes) => rmp_serde::from_slice(&bytes)
            .map(Some)
            .map_err(|why| CacheError::Encoding(why.to_string())),
        None => Ok(None),
    }
}

/// Writes the cache back and resets its TTL, per the "reset on every write"
/// rule: a trip that keeps receiving predictions should not expire mid-run.
pub async fn set(
    cache: &Cache,
    agency: &Agency,
    trip_id: &str,
    entries: &TripUpdateCache,
) -> Result<()> {
    let bytes = rmp_serde::to_vec(entries).map_err(|why| CacheError::Encoding(why.to_string()))?;
    let mut connection = cache.connection();
    connection
        .set_ex::<_, _, ()>(key(agency, trip_id), bytes, TTL_SECONDS)
        .await?;
    Ok(())
}

/// Removed once a trip completes; the prediction cache has no further use
/// once every scheduled stop has either been observed or timed out.
pub async fn delete(cache: &Cache, agency: &Agency, trip_id: &str) -> Result<()> {
    let mut connection = cache.connection();
    connection.del::<_, ()>(key(agency, trip_id)).await?;
    Ok(())
}
