use serde::{Deserialize, Serialize};
use utility::id::HasId;

/// A configured transit operator, identified by the short code it is
/// registered under in `FEED_AGENCIES` (e.g. `"mpk"`, `"mobilis"`). Unlike the
/// teacher's closed agency roster, the set of agencies here is entirely
/// environment-driven, so `Agency` is a thin newtype rather than an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Agency(pub String);

impl Agency {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Agency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Agency {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Agency {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl HasId for Agency {
    type IdType = String;
}
