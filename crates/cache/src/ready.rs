use redis::AsyncCommands;

use crate::{Cache, Result};

const KEY: &str = "gtfs:ready";

/// Set by the Importer once every configured agency has completed at least
/// one successful static load. Polled by the Poller and Detector at startup.
pub async fn is_ready(cache: &Cache) -> Result<bool> {
    let mut connection = cache.connection();
    let exists = connection.exists(KEY).await?;
    Ok(exists)
}

pub async fn set_ready(cache: &Cache) -> Result<()> {
    let mut connection = cache.connection();
    connection.set::<_, _, ()>(KEY, 1).await?;
    Ok(())
}
