use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The Detector's record of where a vehicle last was, keyed by
/// `(agency, license_plate)` in the KV store. Written by the Detector after
/// every processed position; read back to find the previous trip/sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleState {
    pub trip_id: String,
    pub current_stop_sequence: i32,
    pub last_timestamp: DateTime<Utc>,
}

/// A single stop's accumulated predictions within a `TripUpdateCache`.
/// `first_seen_arrival` is set once and never overwritten; `last_seen_arrival`
/// tracks the most recent prediction. Both are considered because the
/// terminal stop's *latest* prediction tends to drift forward as the vehicle
/// lingers post-arrival, while intermediate stops' latest predictions are the
/// more accurate, catch-up reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedStopTime {
    pub stop_id: String,
    pub first_seen_arrival: DateTime<Utc>,
    pub last_seen_arrival: DateTime<Utc>,
}

/// Per-trip prediction cache maintained by the Publisher and consumed by the
/// Detector for sequence-jump backfill and trip-completion detection. Keyed
/// by `(agency, trip_id)` in the KV store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripUpdateCache {
    pub by_sequence: HashMap<i32, CachedStopTime>,
}

impl TripUpdateCache {
    pub fn merge_observation(
        &mut self,
        stop_sequence: i32,
        stop_id: String,
        observed_at: DateTime<Utc>,
    ) {
        self.by_sequence
            .entry(stop_sequence)
            .and_modify(|entry| entry.last_seen_arrival = observed_at)
            .or_insert(CachedStopTime {
                stop_id,
                first_seen_arrival: observed_at,
                last_seen_arrival: observed_at,
            });
    }

    pub fn max_sequence(&self) -> Option<i32> {
        self.by_sequence.keys().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_seen_arrival_is_immutable_after_creation() {
        let mut cache = TripUpdateCache::default();
        let first = Utc.with_ymd_and_hms(2026, 2, 9, 12, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 2, 9, 12, 5, 0).unwrap();

        cache.merge_observation(3, "stop-a".to_owned(), first);
        cache.merge_observation(3, "stop-a".to_owned(), second);

        let entry = cache.by_sequence.get(&3).unwrap();
        assert_eq!(entry.first_seen_arrival, first);
        assert_eq!(entry.last_seen_arrival, second);
    }

    #[test]
    fn max_sequence_is_none_when_empty() {
        let cache = TripUpdateCache::default();
        assert_eq!(cache.max_sequence(), None);
    }

    #[test]
    fn max_sequence_tracks_highest_observed_stop() {
        let mut cache = TripUpdateCache::default();
        let observed_at = Utc.with_ymd_and_hms(2026, 2, 9, 12, 0, 0).unwrap();
        cache.merge_observation(1, "stop-a".to_owned(), observed_at);
        cache.merge_observation(4, "stop-b".to_owned(), observed_at);
        cache.merge_observation(2, "stop-c".to_owned(), observed_at);

        assert_eq!(cache.max_sequence(), Some(4));
    }
}
