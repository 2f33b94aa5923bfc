//! Realtime poller + publisher: fetches `VehiclePositions` and `TripUpdates`
//! feeds per agency on a short tick, parses them, broadcasts vehicle
//! positions on the `vehicle_positions` channel, and merges trip-time
//! predictions into the keyed `TripUpdateCache`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::process::ExitCode;
use std::time::Instant;

use config::{FeedConfig, ServiceConfig};
use lru::LruCache;
use model::agency::Agency;
use model::vehicle::VehiclePosition;
use tokio::time::Duration;

const MIN_PAYLOAD_BYTES: usize = 10;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_SEQUENCE_MAP_CAPACITY: usize = 5_000;

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

    if !wait_for_readiness(&cache, config.readiness_timeout, config.readiness_poll_interval).await
    {
        log::error!("readiness timeout waiting for static feeds to load");
        return ExitCode::FAILURE;
    }

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .expect("http client configuration is valid");

    let mut sequence_maps: LruCache<String, HashMap<String, i32>> =
        LruCache::new(NonZeroUsize::new(STOP_SEQUENCE_MAP_CAPACITY).expect("non-zero"));

    loop {
        for feed in &config.feeds {
            if let Err(why) =
                poll_one_agency(&http, &store, &cache, feed, &mut sequence_maps).await
            {
                log::error!("poll cycle failed for agency {}: {why}", feed.agency);
            }
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}

async fn wait_for_readiness(cache: &cache::Cache, timeout: Duration, poll_interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match cache::ready::is_ready(cache).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(why) => log::warn!("readiness check failed: {why}"),
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn fetch_feed(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let bytes = http.get(url).send().await?.error_for_status()?.bytes().await?;
    Ok(bytes.to_vec())
}

async fn poll_one_agency(
    http: &reqwest::Client,
    store: &store::Store,
    cache: &cache::Cache,
    feed: &FeedConfig,
    sequence_maps: &mut LruCache<String, HashMap<String, i32>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let agency = &feed.agency;

    match fetch_feed(http, &feed.vehicle_positions_url).await {
        Ok(payload) => {
            let published = publish_vehicle_positions(cache, agency, &payload).await?;
            log::debug!("agency {agency}: published {published} vehicle positions");
        }
        Err(why) => log::warn!("agency {agency}: vehicle positions fetch failed: {why}"),
    }

    match fetch_feed(http, &feed.trip_updates_url).await {
        Ok(payload) => {
            let merged =
                merge_trip_updates(store, cache, agency, &payload, sequence_maps).await?;
            log::debug!("agency {agency}: merged {merged} trip updates");
        }
        Err(why) => log::warn!("agency {agency}: trip updates fetch failed: {why}"),
    }

    Ok(())
}

async fn publish_vehicle_positions(
    cache: &cache::Cache,
    agency: &Agency,
    payload: &[u8],
) -> Result<usize, Box<dyn std::error::Error>> {
    if payload.len() < MIN_PAYLOAD_BYTES {
        return Ok(0);
    }

    let positions: Vec<VehiclePosition> = gtfs::realtime::parse_vehicle_positions(payload, agency);
    for position in &positions {
        cache::pubsub::publish(cache, position).await?;
    }
    Ok(positions.len())
}

async fn merge_trip_updates(
    store: &store::Store,
    cache: &cache::Cache,
    agency: &Agency,
    payload: &[u8],
    sequence_maps: &mut LruCache<String, HashMap<String, i32>>,
) -> Result<usize, Box<dyn std::error::Error>> {
    if payload.len() < MIN_PAYLOAD_BYTES {
        return Ok(0);
    }

    let updates = gtfs::realtime::parse_trip_updates(payload, agency);
    let mut merged = 0usize;

    for update in &updates {
        let map_key = format!("{}:{}", agency.as_str(), update.trip_id);
        let sequence_map = match sequence_maps.get(&map_key) {
            Some(map) => map.clone(),
            None => {
                let map = store::queries::lookup::get_stop_id_to_sequence_map(
                    store.pool(),
                    agency,
                    &update.trip_id,
                )
                .await?;
                sequence_maps.put(map_key, map.clone());
                map
            }
        };

        let mut trip_cache =
            cache::trip_update_cache::get(cache, agency, &update.trip_id)
                .await?
                .unwrap_or_default();

        let mut touched = false;
        for stop_time_update in &update.stop_time_updates {
            let Some(stop_sequence) = stop_time_update
                .stop_sequence
                .or_else(|| sequence_map.get(&stop_time_update.stop_id).copied())
            else {
                continue;
            };
            let Some(time) = stop_time_update
                .arrival_time
                .or(stop_time_update.departure_time)
            else {
                continue;
            };

            trip_cache.merge_observation(stop_sequence, stop_time_update.stop_id.clone(), time);
            touched = true;
        }

        if touched {
            cache::trip_update_cache::set(cache, agency, &update.trip_id, &trip_cache).await?;
            merged += 1;
        }
    }

    Ok(merged)
}
