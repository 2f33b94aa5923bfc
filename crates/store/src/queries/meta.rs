use chrono::{DateTime, Utc};
use model::agency::Agency;
use sqlx::{Executor, Postgres};

use crate::convert_error;

/// Returns the hash recorded for `agency`'s last successful load, or `None` if
/// the agency has never been imported.
pub async fn get_current_hash<'c, E>(executor: E, agency: &Agency) -> crate::Result<Option<String>>
where
    E: Executor<'c, Database = Postgres>,
{
    let row: Option<(String,)> =
        sqlx::query_as("SELECT current_hash FROM gtfs_meta WHERE agency = $1")
            .bind(agency.as_str())
            .fetch_optional(executor)
            .await
            .map_err(convert_error)?;

    Ok(row.map(|(hash,)| hash))
}

/// Records the hash of the feed payload just loaded for `agency`.
pub async fn set_current_hash<'c, E>(
    executor: E,
    agency: &Agency,
    hash: &str,
    updated_at: DateTime<Utc>,
) -> crate::Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO gtfs_meta (agency, current_hash, updated_at) VALUES ($1, $2, $3)
         ON CONFLICT (agency) DO UPDATE SET current_hash = EXCLUDED.current_hash, updated_at = EXCLUDED.updated_at",
    )
    .bind(agency.as_str())
    .bind(hash)
    .bind(updated_at)
    .execute(executor)
    .await
    .map_err(convert_error)?;

    Ok(())
}
