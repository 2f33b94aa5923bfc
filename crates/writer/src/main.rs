//! Subscriber + detector + batch writer: consumes `vehicle_positions`,
//! synthesizes stop events, and flushes them to the relational store in
//! batches bounded by size or time, whichever comes first.

use std::process::ExitCode;
use std::time::Instant;

use config::ServiceConfig;
use detector::StopEventDetector;
use model::stop_event::StopEvent;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant as TokioInstant};

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
    let subscriber_cache_info = config.cache.clone();
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

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(run_subscriber(subscriber_cache_info, tx));

    let mut detector = StopEventDetector::new(store.clone(), cache, config.timezone);
    let mut buffer: Vec<StopEvent> = Vec::with_capacity(config.batch_size);
    let mut next_flush = TokioInstant::now() + config.flush_interval;

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    log::error!("vehicle_positions subscription channel closed, shutting down");
                    break;
                };
                match detector.process_position(&message).await {
                    Ok(events) => buffer.extend(events),
                    Err(why) => log::error!("failed to process position for trip {}: {why}", message.trip_id),
                }
                if buffer.len() >= config.batch_size {
                    flush(&store, &mut buffer).await;
                    next_flush = TokioInstant::now() + config.flush_interval;
                }
            }
            _ = tokio::time::sleep_until(next_flush) => {
                flush(&store, &mut buffer).await;
                next_flush = TokioInstant::now() + config.flush_interval;
            }
            _ = shutdown_signal() => {
                log::info!("shutdown signal received, flushing remaining stop events");
                flush(&store, &mut buffer).await;
                break;
            }
        }
    }

    ExitCode::SUCCESS
}

async fn run_subscriber(
    info: cache::ConnectionInfo,
    tx: mpsc::UnboundedSender<cache::pubsub::VehiclePositionMessage>,
) {
    loop {
        let result = cache::pubsub::subscribe(&info, |message| {
            if tx.send(message).is_err() {
                log::warn!("dropping vehicle position: writer loop is no longer receiving");
            }
        })
        .await;
        if let Err(why) = result {
            log::error!("vehicle_positions subscription dropped: {why}, reconnecting");
        } else {
            log::warn!("vehicle_positions subscription ended unexpectedly, reconnecting");
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn flush(store: &store::Store, buffer: &mut Vec<StopEvent>) {
    if buffer.is_empty() {
        return;
    }
    let start = Instant::now();
    let batch_size = buffer.len();
    match store::queries::stop_events::insert_batch(store.pool(), &buffer[..]).await {
        Ok(inserted) => log::info!(
            "flushed {batch_size} stop events ({inserted} new rows) in {:?}",
            start.elapsed()
        ),
        Err(why) => log::error!("failed to flush {batch_size} stop events: {why}"),
    }
    buffer.clear();
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

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
