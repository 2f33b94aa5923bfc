//! Hourly static-feed importer: downloads each configured agency's GTFS zip,
//! reloads the static tables when its content hash has changed, and raises
//! the readiness flag once a full cycle has run.

use std::process::ExitCode;

use config::{FeedConfig, ServiceConfig};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(why) => {
            log::error!("configuration error: {why}");
            return ExitCode::FAILURE;
        }
    };

    let store = match store::Store::connect(config.database).await {
        Ok(store) => store,
        Err(why) => {
            log::error!("failed to connect to the relational store: {why}");
            return ExitCode::FAILURE;
        }
    };
    let cache = match cache::Cache::connect(config.cache).await {
        Ok(cache) => cache,
        Err(why) => {
            log::error!("failed to connect to the key-value store: {why}");
            return ExitCode::FAILURE;
        }
    };

    loop {
        for feed in &config.feeds {
            if let Err(why) = run_one_agency(&store, feed, &config.data_dir).await {
                log::error!("import cycle failed for agency {}: {why}", feed.agency);
            }
        }

        if let Err(why) = cache::ready::set_ready(&cache).await {
            log::error!("failed to raise readiness flag: {why}");
        } else {
            log::info!("import cycle complete, readiness flag is set");
        }

        tokio::time::sleep(config.import_interval).await;
    }
}

async fn run_one_agency(
    store: &store::Store,
    feed: &FeedConfig,
    data_dir: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let agency = &feed.agency;
    let name = agency.as_str();

    let zip_path = gtfs::static_feed::download::download_zip(&feed.static_url, data_dir, name)
        .await?;
    let bytes = std::fs::read(&zip_path)?;
    let hash = gtfs::static_feed::hashing::hash_zip_bytes(&bytes);

    let current_hash =
        store::queries::meta::get_current_hash(store.pool(), agency).await?;
    if current_hash.as_deref() == Some(hash.as_str()) {
        log::debug!("agency {name} static feed unchanged (hash {hash})");
        return Ok(());
    }

    let extracted_dir = data_dir.join(format!("{name}-extracted"));
    let feed_root = gtfs::static_feed::download::extract_zip(&zip_path, &extracted_dir)?;
    let parsed = gtfs::static_feed::load_from_directory(&feed_root, agency)?;

    let mut tx = store.pool().begin().await?;
    store::queries::static_feed::replace_agency_feed(&mut tx, agency, &parsed).await?;
    store::queries::meta::set_current_hash(&mut tx, agency, &hash, chrono::Utc::now()).await?;
    tx.commit().await?;

    log::info!(
        "agency {name} static feed reloaded: {} routes, {} stops, {} trips, {} stop_times",
        parsed.routes.len(),
        parsed.stops.len(),
        parsed.trips.len(),
        parsed.stop_times.len()
    );

    Ok(())
}
