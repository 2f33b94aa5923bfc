//! Environment-variable configuration shared by the three binaries. Mirrors
//! the relational/KV stores' own `from_env` conventions: values are read
//! directly from the process environment, with `_FILE` indirection honored
//! by the store and cache crates for secrets.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use model::agency::Agency;

#[derive(Debug)]
pub enum ConfigError {
    Missing(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing required environment variable {name}"),
            Self::Invalid(why) => write!(f, "invalid configuration: {why}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub type Result<T> = std::result::Result<T, ConfigError>;

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name.to_owned()))
}

fn optional_duration_seconds(name: &str, default_seconds: u64) -> Duration {
    let seconds = std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default_seconds);
    Duration::from_secs(seconds)
}

fn optional_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// One agency's feed endpoints, as configured by `FEED_<AGENCY>_*_URL`.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub agency: Agency,
    pub static_url: String,
    pub vehicle_positions_url: String,
    pub trip_updates_url: String,
}

impl FeedConfig {
    fn from_env(agency: Agency) -> Result<Self> {
        let upper = agency.as_str().to_uppercase();
        Ok(Self {
            static_url: required(&format!("FEED_{upper}_STATIC_URL"))?,
            vehicle_positions_url: required(&format!("FEED_{upper}_VEHICLE_POSITIONS_URL"))?,
            trip_updates_url: required(&format!("FEED_{upper}_TRIP_UPDATES_URL"))?,
            agency,
        })
    }
}

/// Shared runtime configuration for `importer`, `poller`, and `writer`.
pub struct ServiceConfig {
    pub database: store::ConnectionInfo,
    pub cache: cache::ConnectionInfo,
    pub timezone: Tz,
    pub feeds: Vec<FeedConfig>,
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub import_interval: Duration,
    pub readiness_timeout: Duration,
    pub readiness_poll_interval: Duration,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let agencies = required("FEED_AGENCIES")?;
        let feeds = agencies
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(|code| FeedConfig::from_env(Agency::from(code)))
            .collect::<Result<Vec<_>>>()?;
        if feeds.is_empty() {
            return Err(ConfigError::Invalid(
                "FEED_AGENCIES must name at least one agency".to_owned(),
            ));
        }

        let timezone_name =
            std::env::var("SERVICE_TIMEZONE").unwrap_or_else(|_| "Europe/Warsaw".to_owned());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown SERVICE_TIMEZONE '{timezone_name}'")))?;

        let data_dir = PathBuf::from(
            std::env::var("GTFS_DATA_DIR").unwrap_or_else(|_| "/var/lib/gtfs".to_owned()),
        );

        Ok(Self {
            database: store::ConnectionInfo::from_env()
                .map_err(|why| ConfigError::Invalid(why.to_string()))?,
            cache: cache::ConnectionInfo::from_env()
                .map_err(|why| ConfigError::Invalid(why.to_string()))?,
            timezone,
            feeds,
            data_dir,
            poll_interval: optional_duration_seconds("POLL_INTERVAL_SECONDS", 3),
            import_interval: optional_duration_seconds("IMPORT_INTERVAL_SECONDS", 3_600),
            readiness_timeout: optional_duration_seconds("READY_TIMEOUT_SECONDS", 300),
            readiness_poll_interval: optional_duration_seconds("READY_POLL_INTERVAL_SECONDS", 5),
            batch_size: optional_usize("BATCH_SIZE", 100),
            flush_interval: optional_duration_seconds("FLUSH_INTERVAL_SECONDS", 10),
        })
    }
}
