use std::fmt;

#[derive(Debug)]
pub enum GtfsError {
    Io(std::io::Error),
    Http(reqwest::Error),
    Zip(zip::result::ZipError),
    Csv(csv::Error),
    MissingFile(&'static str),
    Malformed(String),
}

impl fmt::Display for GtfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(why) => write!(f, "io error: {why}"),
            Self::Http(why) => write!(f, "http error: {why}"),
            Self::Zip(why) => write!(f, "zip error: {why}"),
            Self::Csv(why) => write!(f, "csv error: {why}"),
            Self::MissingFile(name) => write!(f, "gtfs feed is missing {name}"),
            Self::Malformed(reason) => write!(f, "malformed gtfs row: {reason}"),
        }
    }
}

impl std::error::Error for GtfsError {}

impl From<std::io::Error> for GtfsError {
    fn from(why: std::io::Error) -> Self {
        Self::Io(why)
    }
}

impl From<reqwest::Error> for GtfsError {
    fn from(why: reqwest::Error) -> Self {
        Self::Http(why)
    }
}

impl From<zip::result::ZipError> for GtfsError {
    fn from(why: zip::result::ZipError) -> Self {
        Self::Zip(why)
    }
}

impl From<csv::Error> for GtfsError {
    fn from(why: csv::Error) -> Self {
        Self::Csv(why)
    }
}
