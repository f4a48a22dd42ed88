use super::{FetchedSeries, SeriesSource};
use crate::errors::{AggregatorError, AggregatorResult};
use crate::pnl::Entity;
use reqwest::Client;

/// Client for the scraping proxy (`server.js` / Puppeteer service).
/// The proxy renders the broker's verified P&L page and answers with the
/// extracted daily series.
#[derive(Clone)]
pub struct ProxySource {
    client: Client,
    base_url: String,
}

// Proxy response format:
// {
//   "daily": [ { "date": "2025-01-02T00:00:00.000Z", "pnl": 12500, "percent": 0.13 } ],
//   "capital": 10000000,
//   "clientName": "SACHIN GUPTA",
//   "clientInfo": "Capital: ₹1.00Cr"
// }
// or, when extraction failed: { "error": "..." }

#[derive(serde::Deserialize)]
struct ProxyResponse {
    #[serde(flatten)]
    data: FetchedSeries,
    error: Option<String>,
}

impl ProxySource {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SeriesSource for ProxySource {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn fetch_series(&self, entity: &Entity) -> AggregatorResult<FetchedSeries> {
        if entity.source_url.is_empty() {
            return Err(AggregatorError::Fetch {
                entity: entity.id.clone(),
                reason: "no source url registered".into(),
            });
        }

        let url = format!("{}/api/fetch-pnl", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "url": entity.source_url }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AggregatorError::Proxy {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProxyResponse = resp
            .json()
            .await
            .map_err(|e| AggregatorError::Parse(format!("proxy response for {}: {e}", entity.id)))?;

        if let Some(reason) = parsed.error {
            return Err(AggregatorError::Fetch {
                entity: entity.id.clone(),
                reason,
            });
        }

        tracing::debug!(entity = %entity.id, days = parsed.data.daily.len(), "proxy returned series");
        Ok(parsed.data)
    }
}
