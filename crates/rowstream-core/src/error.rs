use thiserror::Error;

/// Canonical result for the streaming pipeline.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Store unreachable, bad DSN, or authentication failure at open time.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed statement or parameters, detected at execute time.
    #[error("query error: {0}")]
    Query(String),

    /// Fault raised by the store after the stream was successfully opened.
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Error::Query(_))
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Invariant(format!("serialization: {e}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}
