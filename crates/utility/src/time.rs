//! GTFS service-time arithmetic: parsing `HH:MM:SS` schedule offsets (where
//! `HH` may run past 24 for trips that continue into the next calendar day)
//! and converting them to/from service dates and wall-clock instants.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParseError(String);

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid GTFS time: {}", self.0)
    }
}

impl std::error::Error for TimeParseError {}

/// A threshold past which a stop's scheduled offset is considered to belong to
/// the previous service day when the sample itself lands in the small hours.
const LATE_NIGHT_THRESHOLD_SECONDS: i64 = 79_200; // 22:00:00
const HOUR_SECONDS: i64 = 3_600;
const DAY_SECONDS: i64 = 86_400;

/// Parses a GTFS `HH:MM:SS` field into seconds since the service day's
/// midnight. `HH` is not bounded to `[0, 23]`: GTFS uses values `>= 24` to
/// express a stop time that falls after midnight on a trip that is still
/// considered part of the previous service day.
pub fn parse_gtfs_time_to_seconds(value: &str) -> Result<i64, TimeParseError> {
    let parts: Vec<&str> = value.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(TimeParseError(format!(
            "expected HH:MM:SS, got '{value}'"
        )));
    };

    if minutes.len() != 2 || seconds.len() != 2 {
        return Err(TimeParseError(format!(
            "minutes and seconds must be two digits in '{value}'"
        )));
    }
    if !hours.chars().all(|c| c.is_ascii_digit())
        || !minutes.chars().all(|c| c.is_ascii_digit())
        || !seconds.chars().all(|c| c.is_ascii_digit())
    {
        return Err(TimeParseError(format!(
            "all components must be numeric in '{value}'"
        )));
    }

    let hours: i64 = hours
        .parse()
        .map_err(|_| TimeParseError(format!("bad hour component in '{value}'")))?;
    let minutes: i64 = minutes
        .parse()
        .map_err(|_| TimeParseError(format!("bad minute component in '{value}'")))?;
    let seconds: i64 = seconds
        .parse()
        .map_err(|_| TimeParseError(format!("bad second component in '{value}'")))?;

    if !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return Err(TimeParseError(format!(
            "minutes/seconds out of range in '{value}'"
        )));
    }

    Ok(hours * HOUR_SECONDS + minutes * 60 + seconds)
}

/// Derives the service date a sample belongs to, given the instant it was
/// observed and the scheduled offset (in seconds since midnight) of the stop
/// being matched against.
///
/// Two cases push the service date back by one day relative to the sample's
/// local calendar day:
/// - the scheduled offset itself is `>= 86400` (an explicitly overnight stop
///   time), or
/// - the offset is late (`>= 22:00:00`) and the sample was actually observed
///   after local midnight but before 03:00 — i.e. a vehicle running late on
///   an in-day trip was caught just past the day boundary.
pub fn compute_service_date(
    event_time: DateTime<Utc>,
    scheduled_seconds: i64,
    tz: Tz,
) -> NaiveDate {
    let local = event_time.with_timezone(&tz);
    let local_date = local.date_naive();

    if scheduled_seconds >= DAY_SECONDS {
        local_date - Duration::days(1)
    } else if scheduled_seconds >= LATE_NIGHT_THRESHOLD_SECONDS && local.hour() < 3 {
        local_date - Duration::days(1)
    } else {
        local_date
    }
}

/// Reconstructs the absolute instant a scheduled offset refers to, for a given
/// service date.
pub fn compute_planned_time(
    service_date: NaiveDate,
    scheduled_seconds: i64,
    tz: Tz,
) -> Result<DateTime<Tz>, TimeParseError> {
    let day_offset = scheduled_seconds.div_euclid(DAY_SECONDS);
    let seconds_in_day = scheduled_seconds.rem_euclid(DAY_SECONDS);

    let midnight = tz
        .from_local_datetime(&service_date.and_hms_opt(0, 0, 0).ok_or_else(|| {
            TimeParseError("service date has no representable midnight".to_owned())
        })?)
        .single()
        .ok_or_else(|| {
            TimeParseError(format!(
                "service date {service_date} midnight is ambiguous in {tz} (DST transition)"
            ))
        })?;

    Ok(midnight + Duration::days(day_offset) + Duration::seconds(seconds_in_day))
}

/// `event_time - planned_time`, in whole seconds. Positive means the vehicle
/// arrived late.
pub fn compute_delay_seconds<Tz1: TimeZone, Tz2: TimeZone>(
    event_time: DateTime<Tz1>,
    planned_time: DateTime<Tz2>,
) -> i64 {
    (event_time.with_timezone(&Utc) - planned_time.with_timezone(&Utc)).num_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Warsaw;

    #[test]
    fn parses_ordinary_time() {
        assert_eq!(parse_gtfs_time_to_seconds("08:15:30").unwrap(), 8 * 3600 + 15 * 60 + 30);
    }

    #[test]
    fn parses_overnight_time_past_midnight() {
        assert_eq!(parse_gtfs_time_to_seconds("25:05:00").unwrap(), 25 * 3600 + 300);
    }

    #[test]
    fn rejects_malformed_time() {
        assert!(parse_gtfs_time_to_seconds("8:5:30").is_err());
        assert!(parse_gtfs_time_to_seconds("08:61:00").is_err());
        assert!(parse_gtfs_time_to_seconds("bogus").is_err());
    }

    #[test]
    fn overnight_scheduled_seconds_push_service_date_back() {
        let event_time = Warsaw
            .with_ymd_and_hms(2026, 2, 9, 0, 10, 0)
            .unwrap()
            .with_timezone(&Utc);
        let service_date = compute_service_date(event_time, 90_000, Warsaw);
        assert_eq!(service_date, NaiveDate::from_ymd_opt(2026, 2, 8).unwrap());
    }

    #[test]
    fn late_night_in_day_trip_also_pushed_back() {
        // Scheduled for 22:30 (81000s, < 86400) but sample lands at 00:05 local.
        let event_time = Warsaw
            .with_ymd_and_hms(2026, 2, 9, 0, 5, 0)
            .unwrap()
            .with_timezone(&Utc);
        let service_date = compute_service_date(event_time, 81_000, Warsaw);
        assert_eq!(service_date, NaiveDate::from_ymd_opt(2026, 2, 8).unwrap());
    }

    #[test]
    fn ordinary_daytime_trip_keeps_calendar_date() {
        let event_time = Warsaw
            .with_ymd_and_hms(2026, 2, 9, 13, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let service_date = compute_service_date(event_time, 43_200, Warsaw);
        assert_eq!(service_date, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
    }

    #[test]
    fn planned_time_round_trips_through_scheduled_seconds() {
        let service_date = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        for seconds in [0i64, 3_600, 43_200, 86_399, 90_000, 107_999] {
            let planned = compute_planned_time(service_date, seconds, Warsaw).unwrap();
            let midnight = compute_planned_time(service_date, 0, Warsaw).unwrap();
            let back = (planned - midnight).num_seconds();
            assert_eq!(back, seconds, "round-trip failed for {seconds}");
        }
    }

    #[test]
    fn delay_is_antisymmetric() {
        let a = Warsaw.with_ymd_and_hms(2026, 2, 9, 13, 5, 0).unwrap();
        let b = Warsaw.with_ymd_and_hms(2026, 2, 9, 13, 0, 0).unwrap();
        assert_eq!(compute_delay_seconds(a, b), -compute_delay_seconds(b, a));
        assert_eq!(compute_delay_seconds(a, b), 300);
    }
}
