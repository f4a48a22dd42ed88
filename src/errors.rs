/// Error types for the performance aggregator.
/// The pure P&L math never fails; these cover the edges around it:
/// - registry validation (capital, names, unknown ids)
/// - fetching series from the proxy, files, or the cache
/// - configuration and persistence
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("proxy error: {status} {body}")]
    Proxy { status: u16, body: String },

    #[error("fetch failed for {entity}: {reason}")]
    Fetch { entity: String, reason: String },

    #[error("invalid capital {0}: must be a positive amount")]
    InvalidCapital(f64),

    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for AggregatorError {
    fn from(e: reqwest::Error) -> Self {
        AggregatorError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AggregatorError {
    fn from(e: serde_json::Error) -> Self {
        AggregatorError::Parse(e.to_string())
    }
}

impl From<rusqlite::Error> for AggregatorError {
    fn from(e: rusqlite::Error) -> Self {
        AggregatorError::Database(e.to_string())
    }
}

impl From<std::io::Error> for AggregatorError {
    fn from(e: std::io::Error) -> Self {
        AggregatorError::Io(e.to_string())
    }
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;
