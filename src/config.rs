use crate::errors::{AggregatorError, AggregatorResult};
use std::path::PathBuf;

/// Where entity series are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Scraping proxy (`POST /api/fetch-pnl`).
    Proxy,
    /// Hand-entered JSON files, one per entity.
    File,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub series_source: SourceKind,
    pub proxy_base_url: String,
    pub series_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_ttl_secs: i64,
    pub fetch_timeout_secs: u64,
    pub default_capital: f64,
    /// Background rebuild interval; 0 disables the refresher.
    pub refresh_interval_secs: u64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> AggregatorResult<Self> {
        dotenvy::dotenv().ok();

        let series_source = parse_source(&env_var_or("SERIES_SOURCE", "file"))?;

        let cache_ttl_secs = env_var_or("CACHE_TTL_SECS", "3600")
            .parse::<i64>()
            .map_err(|e| AggregatorError::Config(format!("CACHE_TTL_SECS: {e}")))?;

        let fetch_timeout_secs = env_var_or("FETCH_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| AggregatorError::Config(format!("FETCH_TIMEOUT_SECS: {e}")))?;

        let default_capital = env_var_or("DEFAULT_CAPITAL", "10000000")
            .parse::<f64>()
            .map_err(|e| AggregatorError::Config(format!("DEFAULT_CAPITAL: {e}")))?;
        if !default_capital.is_finite() || default_capital <= 0.0 {
            return Err(AggregatorError::Config(format!(
                "DEFAULT_CAPITAL: must be positive, got {default_capital}"
            )));
        }

        let refresh_interval_secs = env_var_or("REFRESH_INTERVAL_SECS", "1800")
            .parse::<u64>()
            .map_err(|e| AggregatorError::Config(format!("REFRESH_INTERVAL_SECS: {e}")))?;

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| AggregatorError::Config(format!("SERVER_PORT: {e}")))?;

        Ok(Self {
            series_source,
            proxy_base_url: env_var_or("PROXY_BASE_URL", "http://localhost:3000"),
            series_dir: PathBuf::from(env_var_or("SERIES_DIR", "data/series")),
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            cache_ttl_secs,
            fetch_timeout_secs,
            default_capital,
            refresh_interval_secs,
            server_port,
        })
    }
}

fn parse_source(raw: &str) -> AggregatorResult<SourceKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "proxy" => Ok(SourceKind::Proxy),
        "file" => Ok(SourceKind::File),
        other => Err(AggregatorError::Config(format!(
            "SERIES_SOURCE: expected 'proxy' or 'file', got '{other}'"
        ))),
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
