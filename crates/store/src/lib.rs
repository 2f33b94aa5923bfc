use std::{env, fmt};

pub mod queries;

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "row not found"),
            Self::Other(why) => write!(f, "store error: {why}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type Result<T> = std::result::Result<T, StoreError>;

pub(crate) fn convert_error(why: sqlx::Error) -> StoreError {
    match why {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Other(Box::new(why)),
    }
}

/// Connection parameters for the relational store. `username`/`password` may
/// each be supplied either directly (`DATABASE_USER`) or indirected through a
/// file (`DATABASE_USER_FILE`), so secrets can be mounted rather than passed
/// as plaintext environment values.
pub struct ConnectionInfo {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub database: String,
}

impl ConnectionInfo {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            username: read_env_or_file("DATABASE_USER")?,
            password: read_env_or_file("DATABASE_PASSWORD")?,
            hostname: read_env_or_file("DATABASE_HOST")?,
            port: read_env_or_file("DATABASE_PORT")?
                .parse()
                .map_err(|why| StoreError::Other(Box::new(EnvParseError(format!("DATABASE_PORT: {why}")))))?,
            database: read_env_or_file("DATABASE_NAME")?,
        })
    }

    fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.hostname, self.port, self.database
        )
    }
}

#[derive(Debug)]
struct EnvParseError(String);

impl fmt::Display for EnvParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EnvParseError {}

/// Reads `NAME`, falling back to the content of the file named by
/// `NAME_FILE` when `NAME` itself is unset.
pub fn read_env_or_file(name: &str) -> Result<String> {
    if let Ok(value) = env::var(name) {
        return Ok(value);
    }
    let file_name = format!("{name}_FILE");
    let path = env::var(&file_name).map_err(|_| {
        StoreError::Other(Box::new(EnvParseError(format!(
            "neither {name} nor {file_name} is set"
        ))))
    })?;
    std::fs::read_to_string(&path)
        .map(|content| content.trim().to_owned())
        .map_err(|why| StoreError::Other(Box::new(why)))
}

#[derive(Clone)]
pub struct Store {
    pool: sqlx::PgPool,
}

impl Store {
    pub async fn connect(info: ConnectionInfo) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&info.postgres_url())
            .await
            .map_err(convert_error)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|why| StoreError::Other(Box::new(why)))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}
