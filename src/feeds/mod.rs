pub mod cache;
pub mod file;
pub mod proxy;

use crate::errors::AggregatorResult;
use crate::pnl::{Entity, RawEntry};

/// Raw data for one entity as delivered by the scraping proxy or a
/// hand-entered file. Also the payload stored in the series cache.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedSeries {
    #[serde(default)]
    pub daily: Vec<RawEntry>,
    #[serde(default, deserialize_with = "crate::pnl::lenient_amount")]
    pub capital: Option<f64>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_label")]
    pub client_info: Option<String>,
}

/// Only JSON strings count as labels; anything else is treated as absent.
fn lenient_label<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    use serde::Deserialize;
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Where an entity's series comes from.
/// Implementations own their own timeouts; callers fan out concurrently.
#[async_trait::async_trait]
pub trait SeriesSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_series(&self, entity: &Entity) -> AggregatorResult<FetchedSeries>;
}
