//! The stop-event detector: consumes vehicle positions one at a time and
//! synthesizes `StopEvent`s via direct observation, sequence-jump backfill,
//! and trip-completion timeout, enforcing exactly-once emission per
//! `(trip_id, service_date, stop_sequence)`.

use std::fmt;
use std::num::NonZeroUsize;

use cache::pubsub::VehiclePositionMessage;
use chrono::Utc;
use chrono_tz::Tz;
use lru::LruCache;
use model::agency::Agency;
use model::cache::VehicleState;
use model::gtfs_static::{Route, Stop, StopTime, Trip};
use model::stop_event::{DetectionMethod, StopEvent};
use model::vehicle::VehicleStatus;

const STATIC_LRU_CAPACITY: usize = 4_000;

#[derive(Debug)]
pub enum DetectorError {
    Store(store::StoreError),
    Cache(cache::CacheError),
    Time(utility::time::TimeParseError),
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(why) => write!(f, "{why}"),
            Self::Cache(why) => write!(f, "{why}"),
            Self::Time(why) => write!(f, "{why}"),
        }
    }
}

impl std::error::Error for DetectorError {}

impl From<store::StoreError> for DetectorError {
    fn from(why: store::StoreError) -> Self {
        Self::Store(why)
    }
}

impl From<cache::CacheError> for DetectorError {
    fn from(why: cache::CacheError) -> Self {
        Self::Cache(why)
    }
}

impl From<utility::time::TimeParseError> for DetectorError {
    fn from(why: utility::time::TimeParseError) -> Self {
        Self::Time(why)
    }
}

pub type Result<T> = std::result::Result<T, DetectorError>;

/// Bounded, per-process, single-writer static-data caches. Not coherent across
/// worker restarts or processes; freshness is bounded by eviction and by the
/// importer's at-most-hourly reload cadence.
struct StaticCaches {
    trips: LruCache<String, Trip>,
    routes: LruCache<String, Route>,
    stops: LruCache<String, Stop>,
    stop_times: LruCache<String, StopTime>,
    max_sequences: LruCache<String, i32>,
    static_hashes: LruCache<String, String>,
}

impl StaticCaches {
    fn new() -> Self {
        let capacity = NonZeroUsize::new(STATIC_LRU_CAPACITY).expect("non-zero");
        Self {
            trips: LruCache::new(capacity),
            routes: LruCache::new(capacity),
            stops: LruCache::new(capacity),
            stop_times: LruCache::new(capacity),
            max_sequences: LruCache::new(capacity),
            static_hashes: LruCache::new(capacity),
        }
    }
}

/// Owns the static-store connection, the cache-store connection, the
/// configured timezone, and the in-process static-data caches. Intended to be
/// driven by a single consumer task — see the module docs on ordering.
pub struct StopEventDetector {
    store: store::Store,
    cache: cache::Cache,
    timezone: Tz,
    statics: StaticCaches,
}

impl StopEventDetector {
    pub fn new(store: store::Store, cache: cache::Cache, timezone: Tz) -> Self {
        Self {
            store,
            cache,
            timezone,
            statics: StaticCaches::new(),
        }
    }

    async fn resolve_trip(&mut self, agency: &Agency, trip_id: &str) -> Result<Option<Trip>> {
        let key = format!("{}:{}", agency.as_str(), trip_id);
        if let Some(trip) = self.statics.trips.get(&key) {
            return Ok(Some(trip.clone()));
        }
        match store::queries::lookup::get_trip(self.store.pool(), agency, trip_id).await {
            Ok(trip) => {
                self.statics.trips.put(key, trip.clone());
                Ok(Some(trip))
            }
            Err(store::StoreError::NotFound) => Ok(None),
            Err(why) => Err(why.into()),
        }
    }

    async fn resolve_route(&mut self, agency: &Agency, route_id: &str) -> Result<Option<Route>> {
        let key = format!("{}:{}", agency.as_str(), route_id);
        if let Some(route) = self.statics.routes.get(&key) {
            return Ok(Some(route.clone()));
        }
        match store::queries::lookup::get_route(self.store.pool(), agency, route_id).await {
            Ok(route) => {
                self.statics.routes.put(key, route.clone());
                Ok(Some(route))
            }
            Err(store::StoreError::NotFound) => Ok(None),
            Err(why) => Err(why.into()),
        }
    }

    async fn resolve_stop(&mut self, agency: &Agency, stop_id: &str) -> Result<Option<Stop>> {
        let key = format!("{}:{}", agency.as_str(), stop_id);
        if let Some(stop) = self.statics.stops.get(&key) {
            return Ok(Some(stop.clone()));
        }
        match store::queries::lookup::get_stop(self.store.pool(), agency, stop_id).await {
            Ok(stop) => {
                self.statics.stops.put(key, stop.clone());
                Ok(Some(stop))
            }
            Err(store::StoreError::NotFound) => Ok(None),
            Err(why) => Err(why.into()),
        }
    }

    async fn resolve_stop_time(
        &mut self,
        agency: &Agency,
        trip_id: &str,
        stop_sequence: i32,
    ) -> Result<Option<StopTime>> {
        let key = format!("{}:{}:{}", agency.as_str(), trip_id, stop_sequence);
        if let Some(stop_time) = self.statics.stop_times.get(&key) {
            return Ok(Some(stop_time.clone()));
        }
        match store::queries::lookup::get_stop_time(
            self.store.pool(),
            agency,
            trip_id,
            stop_sequence,
        )
        .await
        {
            Ok(stop_time) => {
                self.statics.stop_times.put(key, stop_time.clone());
                Ok(Some(stop_time))
            }
            Err(store::StoreError::NotFound) => Ok(None),
            Err(why) => Err(why.into()),
        }
    }

    async fn resolve_max_sequence(
        &mut self,
        agency: &Agency,
        trip_id: &str,
    ) -> Result<Option<i32>> {
        let key = format!("{}:{}", agency.as_str(), trip_id);
        if let Some(max_sequence) = self.statics.max_sequences.get(&key) {
            return Ok(Some(*max_sequence));
        }
        let max_sequence =
            store::queries::lookup::get_max_sequence(self.store.pool(), agency, trip_id).await?;
        if let Some(value) = max_sequence {
            self.statics.max_sequences.put(key, value);
        }
        Ok(max_sequence)
    }

    async fn resolve_static_hash(&mut self, agency: &Agency) -> Result<Option<String>> {
        let key = agency.as_str().to_owned();
        if let Some(hash) = self.statics.static_hashes.get(&key) {
            return Ok(Some(hash.clone()));
        }
        let hash = store::queries::meta::get_current_hash(self.store.pool(), agency).await?;
        if let Some(value) = &hash {
            self.statics.static_hashes.put(key, value.clone());
        }
        Ok(hash)
    }

    /// Forgets a cached static hash, e.g. after the importer reports a
    /// change, so the next lookup picks up the new value.
    pub fn invalidate_static_hash(&mut self, agency: &Agency) {
        self.statics.static_hashes.pop(agency.as_str());
    }

    /// Assembles a `StopEvent` from a resolved static join plus the detection
    /// outcome, or returns `None` if the agency's static hash is not yet
    /// known (per the hash-gating invariant, no event is ever emitted without
    /// one).
    #[allow(clippy::too_many_arguments)]
    async fn build_event(
        &mut self,
        agency: &Agency,
        trip: &Trip,
        stop_time: &StopTime,
        stop_sequence: i32,
        vehicle_id: Option<String>,
        license_plate: &str,
        event_time: chrono::DateTime<Utc>,
        detection_method: DetectionMethod,
        is_estimated: bool,
    ) -> Result<Option<StopEvent>> {
        let Some(static_hash) = self.resolve_static_hash(agency).await? else {
            return Ok(None);
        };
        let Some(route) = self.resolve_route(agency, &trip.route_id.raw()).await? else {
            return Ok(None);
        };
        let Some(stop) = self.resolve_stop(agency, &stop_time.stop_id.raw()).await? else {
            return Ok(None);
        };

        let service_date =
            utility::time::compute_service_date(event_time, stop_time.arrival_seconds, self.timezone);
        let planned_time = utility::time::compute_planned_time(
            service_date,
            stop_time.arrival_seconds,
            self.timezone,
        )?;
        let delay_seconds = utility::time::compute_delay_seconds(event_time, planned_time);

        Ok(Some(StopEvent {
            agency: agency.clone(),
            trip_id: trip.id.raw(),
            service_date,
            stop_sequence,
            stop_id: stop.id.raw(),
            line_number: route.line_number,
            stop_name: stop.name,
            stop_desc: stop.description,
            direction: trip.direction,
            headsign: trip.headsign.clone(),
            planned_time: planned_time.with_timezone(&Utc),
            event_time,
            delay_seconds: delay_seconds as i32,
            vehicle_id,
            license_plate: license_plate.to_owned(),
            detection_method,
            is_estimated,
            static_hash,
            created_at: Utc::now(),
        }))
    }

    /// Processes one vehicle position, returning zero or more stop events in
    /// emission order (completion events for the outgoing trip first, then
    /// detections for the current position). Updates `VehicleState`
    /// regardless of whether any event was produced.
    pub async fn process_position(
        &mut self,
        position: &VehiclePositionMessage,
    ) -> Result<Vec<StopEvent>> {
        let (Some(stop_sequence), license_plate) =
            (position.stop_sequence, position.license_plate.as_str())
        else {
            return Ok(Vec::new());
        };
        if license_plate.is_empty() {
            return Ok(Vec::new());
        }

        let agency = &position.agency;
        let mut events = Vec::new();

        let previous_state = cache::vehicle_state::get(&self.cache, agency, license_plate)
            .await?;
        let carried_over = match previous_state {
            Some(prev) if prev.trip_id == position.trip_id => Some(prev),
            Some(prev) => {
                let completion = self
                    .complete_trip(agency, license_plate, &prev)
                    .await?;
                events.extend(completion);
                None
            }
            None => None,
        };

        let Some(trip) = self.resolve_trip(agency, &position.trip_id).await? else {
            self.write_state(agency, license_plate, &position.trip_id, stop_sequence, position.timestamp)
                .await?;
            return Ok(events);
        };
        let Some(stop_time) = self
            .resolve_stop_time(agency, &position.trip_id, stop_sequence)
            .await?
        else {
            self.write_state(agency, license_plate, &position.trip_id, stop_sequence, position.timestamp)
                .await?;
            return Ok(events);
        };

        let service_date = utility::time::compute_service_date(
            position.timestamp,
            stop_time.arrival_seconds,
            self.timezone,
        );

        if position.status == Some(VehicleStatus::StoppedAt as i32) {
            let already_saved = cache::saved_sequences::contains(
                &self.cache,
                agency,
                &position.trip_id,
                service_date,
                stop_sequence,
            )
            .await?;
            if !already_saved {
                if let Some(event) = self
                    .build_event(
                        agency,
                        &trip,
                        &stop_time,
                        stop_sequence,
                        position.vehicle_id.clone(),
                        license_plate,
                        position.timestamp,
                        DetectionMethod::StoppedAt,
                        false,
                    )
                    .await?
                {
                    cache::saved_sequences::mark(
                        &self.cache,
                        agency,
                        &position.trip_id,
                        service_date,
                        stop_sequence,
                    )
                    .await?;
                    events.push(event);
                }
            }
        }

        if let Some(prev) = carried_over.filter(|prev| stop_sequence > prev.current_stop_sequence) {
            let trip_cache =
                cache::trip_update_cache::get(&self.cache, agency, &position.trip_id).await?;
            if let Some(trip_cache) = trip_cache {
                for missed_sequence in prev.current_stop_sequence..stop_sequence {
                    let Some(cached) = trip_cache.by_sequence.get(&missed_sequence) else {
                        continue;
                    };
                    let Some(missed_stop_time) = self
                        .resolve_stop_time(agency, &position.trip_id, missed_sequence)
                        .await?
                    else {
                        continue;
                    };
                    let missed_service_date = utility::time::compute_service_date(
                        cached.last_seen_arrival,
                        missed_stop_time.arrival_seconds,
                        self.timezone,
                    );

                    let already_saved = cache::saved_sequences::contains(
                        &self.cache,
                        agency,
                        &position.trip_id,
                        missed_service_date,
                        missed_sequence,
                    )
                    .await?;
                    if already_saved {
                        continue;
                    }

                    if let Some(event) = self
                        .build_event(
                            agency,
                            &trip,
                            &missed_stop_time,
                            missed_sequence,
                            position.vehicle_id.clone(),
                            license_plate,
                            cached.last_seen_arrival,
                            DetectionMethod::SeqJump,
                            true,
                        )
                        .await?
                    {
                        cache::saved_sequences::mark(
                            &self.cache,
                            agency,
                            &position.trip_id,
                            missed_service_date,
                            missed_sequence,
                        )
                        .await?;
                        events.push(event);
                    }
                }
            }
        }

        self.write_state(agency, license_plate, &position.trip_id, stop_sequence, position.timestamp)
            .await?;

        Ok(events)
    }

    async fn write_state(
        &self,
        agency: &Agency,
        license_plate: &str,
        trip_id: &str,
        stop_sequence: i32,
        timestamp: chrono::DateTime<Utc>,
    ) -> Result<()> {
        cache::vehicle_state::set(
            &self.cache,
            agency,
            license_plate,
            &VehicleState {
                trip_id: trip_id.to_owned(),
                current_stop_sequence: stop_sequence,
                last_timestamp: timestamp,
            },
        )
        .await?;
        Ok(())
    }

    /// Completion algorithm for a vehicle's outgoing trip, run the moment a
    /// new position reports a different `trip_id`. Emits a `SEQ_JUMP` for
    /// every intermediate stop that a prediction exists for, and a `TIMEOUT`
    /// for the terminal stop (using its *first*-seen prediction, since the
    /// terminal stop's latest prediction tends to drift forward during
    /// layover).
    async fn complete_trip(
        &mut self,
        agency: &Agency,
        license_plate: &str,
        prev: &VehicleState,
    ) -> Result<Vec<StopEvent>> {
        let mut events = Vec::new();

        let Some(trip_cache) =
            cache::trip_update_cache::get(&self.cache, agency, &prev.trip_id).await?
        else {
            cache::vehicle_state::delete(&self.cache, agency, license_plate).await?;
            return Ok(events);
        };
        let Some(max_sequence) = self.resolve_max_sequence(agency, &prev.trip_id).await? else {
            cache::trip_update_cache::delete(&self.cache, agency, &prev.trip_id).await?;
            cache::vehicle_state::delete(&self.cache, agency, license_plate).await?;
            return Ok(events);
        };
        let Some(trip) = self.resolve_trip(agency, &prev.trip_id).await? else {
            cache::trip_update_cache::delete(&self.cache, agency, &prev.trip_id).await?;
            cache::vehicle_state::delete(&self.cache, agency, license_plate).await?;
            return Ok(events);
        };

        for sequence in (prev.current_stop_sequence + 1)..=max_sequence {
            let Some(cached) = trip_cache.by_sequence.get(&sequence) else {
                continue;
            };
            let Some(stop_time) = self.resolve_stop_time(agency, &prev.trip_id, sequence).await?
            else {
                continue;
            };

            let (event_time, detection_method) = if sequence == max_sequence {
                (cached.first_seen_arrival, DetectionMethod::Timeout)
            } else {
                (cached.last_seen_arrival, DetectionMethod::SeqJump)
            };
            let service_date = utility::time::compute_service_date(
                event_time,
                stop_time.arrival_seconds,
                self.timezone,
            );

            let already_saved = cache::saved_sequences::contains(
                &self.cache,
                agency,
                &prev.trip_id,
                service_date,
                sequence,
            )
            .await?;
            if already_saved {
                continue;
            }

            if let Some(event) = self
                .build_event(
                    agency,
                    &trip,
                    &stop_time,
                    sequence,
                    None,
                    license_plate,
                    event_time,
                    detection_method,
                    true,
                )
                .await?
            {
                cache::saved_sequences::mark(
                    &self.cache,
                    agency,
                    &prev.trip_id,
                    service_date,
                    sequence,
                )
                .await?;
                events.push(event);
            }
        }

        cache::trip_update_cache::delete(&self.cache, agency, &prev.trip_id).await?;
        cache::vehicle_state::delete(&self.cache, agency, license_plate).await?;

        Ok(events)
    }
}
