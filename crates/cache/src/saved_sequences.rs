use chrono::NaiveDate;
use model::agency::Agency;
use redis::AsyncCommands;

use crate::{Cache, Result};

const TTL_SECONDS: i64 = 24 * 60 * 60;

fn key(agency: &Agency, trip_id: &str, service_date: NaiveDate) -> String {
    format!("saved:{}:{}:{}", agency.as_str(), trip_id, service_date)
}

/// Whether `stop_sequence` has already produced a persisted event for this
/// trip/service date. The set only ever grows within its TTL — this is the
/// in-process half of the exactly-once guarantee; the DB unique constraint is
/// the other half.
pub async fn contains(
    cache: &Cache,
    agency: &Agency,
    trip_id: &str,
    service_date: NaiveDate,
    stop_sequence: i32,
) -> Result<bool> {
    let mut connection = cache.connection();
    let is_member = connection
        .sismember(key(agency, trip_id, service_date), stop_sequence)
        .await?;
    Ok(is_member)
}

/// Marks `stop_sequence` as saved and (re)sets the set's TTL.
pub async fn mark(
    cache: &Cache,
    agency: &Agency,
    trip_id: &str,
    service_date: NaiveDate,
    stop_sequence: i32,
) -> Result<()> {
    let redis_key = key(agency, trip_id, service_date);
    let mut connection = cache.connection();
    connection
        .sadd::<_, _, ()>(&redis_key, stop_sequence)
        .await?;
    connection
        .expire::<_, ()>(&redis_key, TTL_SECONDS)
        .await?;
    Ok(())
}
