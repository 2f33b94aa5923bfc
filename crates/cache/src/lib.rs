use std::{env, fmt};

use redis::aio::ConnectionManager;

pub mod pubsub;
pub mod ready;
pub mod saved_sequences;
pub mod trip_update_cache;
pub mod vehicle_state;

#[derive(Debug)]
pub enum CacheError {
    Redis(redis::RedisError),
    Encoding(String),
    Config(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis(why) => write!(f, "redis error: {why}"),
            Self::Encoding(why) => write!(f, "cache encoding error: {why}"),
            Self::Config(why) => write!(f, "cache configuration error: {why}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<redis::RedisError> for CacheError {
    fn from(why: redis::RedisError) -> Self {
        Self::Redis(why)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Reads `NAME`, falling back to the content of the file named by `NAME_FILE`.
/// Mirrors the relational store's secret-indirection convention so operators
/// can mount Redis credentials the same way as database credentials.
pub fn read_env_or_file(name: &str) -> Result<String> {
    if let Ok(value) = env::var(name) {
        return Ok(value);
    }
    let file_name = format!("{name}_FILE");
    let path = env::var(&file_name)
        .map_err(|_| CacheError::Config(format!("neither {name} nor {file_name} is set")))?;
    std::fs::read_to_string(&path)
        .map(|content| content.trim().to_owned())
        .map_err(|why| CacheError::Config(format!("reading {path}: {why}")))
}

/// Connection parameters for the key-value store.
#[derive(Clone)]
pub struct ConnectionInfo {
    pub hostname: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: i64,
}

impl ConnectionInfo {
    pub fn from_env() -> Result<Self> {
        let password = match read_env_or_file("REDIS_PASSWORD") {
            Ok(value) => Some(value),
            Err(_) => None,
        };

        Ok(Self {
            hostname: read_env_or_file("REDIS_HOST")?,
            port: read_env_or_file("REDIS_PORT")?
                .parse()
                .map_err(|why| CacheError::Config(format!("REDIS_PORT: {why}")))?,
            password,
            database: env::var("REDIS_DATABASE")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(0),
        })
    }

    pub(crate) fn redis_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.hostname, self.port, self.database
            ),
            None => format!("redis://{}:{}/{}", self.hostname, self.port, self.database),
        }
    }
}

/// A connected handle to the key-value store. Wraps a `ConnectionManager`,
/// which reconnects and retries transparently, so callers never need to
/// re-dial after a transient network blip.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

impl Cache {
    pub async fn connect(info: ConnectionInfo) -> Result<Self> {
        let client = redis::Client::open(info.redis_url())?;
        let connection = client.get_tokio_connection_manager().await?;
        Ok(Self { connection })
    }

    pub(crate) fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}
