pub mod combine;
pub mod metrics;
pub mod normalize;
pub mod rollup;
pub mod summary;

use crate::errors::{AggregatorError, AggregatorResult};
use chrono::NaiveDate;

/// Label used when neither the fetched data nor the registry yields a usable name.
pub const DEFAULT_ENTITY_LABEL: &str = "FiFTO Portfolio";

/// `pnl` as a percentage of `capital`. Zero when there is no capital to divide by.
#[inline]
pub fn percent_of(pnl: f64, capital: f64) -> f64 {
    if capital > 0.0 && capital.is_finite() {
        pnl / capital * 100.0
    } else {
        0.0
    }
}

/// Reject capital bases that cannot serve as a percent denominator.
pub fn validate_capital(capital: f64) -> AggregatorResult<f64> {
    if capital.is_finite() && capital > 0.0 {
        Ok(capital)
    } else {
        Err(AggregatorError::InvalidCapital(capital))
    }
}

// ── Series types ──

/// One calendar day's realized P&L for one entity (or the combined view).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub pnl: f64,
    pub percent: f64,
}

/// A P&L amount as it arrives from a scraper or a hand-entered file.
/// Scraped tables deliver strings like `"₹1,20,000"`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
    /// Booleans, objects and anything else a scraper may emit. Never numeric.
    Other(serde_json::Value),
}

impl RawAmount {
    /// Numeric value, or `None` when it is not a finite number.
    pub fn value(&self) -> Option<f64> {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| *c != '₹' && *c != ',' && !c.is_whitespace())
                    .collect();
                cleaned.parse::<f64>().ok()?
            }
            Self::Other(_) => return None,
        };
        v.is_finite().then_some(v)
    }
}

/// Unvalidated input to the normalizer. `percent` is accepted but never trusted.
/// Deserialization accepts any JSON per field so that one bad row is
/// skipped by the normalizer instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawEntry {
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(default)]
    pub pnl: Option<RawAmount>,
    #[serde(default, deserialize_with = "lenient_amount", skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

/// Strings pass through; `null` becomes empty; other values keep their JSON text.
fn lenient_text<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::Deserialize;
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A number or numeric string (`"₹1,00,00,000"`); anything else is `None`.
pub(crate) fn lenient_amount<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    use serde::Deserialize;
    Ok(Option::<RawAmount>::deserialize(deserializer)?.and_then(|a| a.value()))
}

#[cfg(test)]
impl From<&DailyEntry> for RawEntry {
    fn from(e: &DailyEntry) -> Self {
        Self {
            date: e.date.format("%Y-%m-%d").to_string(),
            pnl: Some(RawAmount::Number(e.pnl)),
            percent: Some(e.percent),
        }
    }
}

// ── Entity ──

/// An account being tracked ("client" on the dashboard).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub source_url: String,
    pub capital: f64,
    pub created_at: String,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_url: impl Into<String>,
        capital: f64,
    ) -> AggregatorResult<Self> {
        let id = id.into();
        let name = name.into().trim().to_string();
        if id.trim().is_empty() {
            return Err(AggregatorError::InvalidEntity("id must not be empty".into()));
        }
        if name.is_empty() {
            return Err(AggregatorError::InvalidEntity("name must not be empty".into()));
        }
        Ok(Self {
            id,
            name,
            source_url: source_url.into().trim().to_string(),
            capital: validate_capital(capital)?,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

// ── Summary ──

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PnlWindow {
    pub pnl: f64,
    pub percent: f64,
}

impl PnlWindow {
    #[inline]
    pub fn from_pnl(pnl: f64, capital: f64) -> Self {
        Self {
            pnl,
            percent: percent_of(pnl, capital),
        }
    }
}

/// Today / month-to-date / total snapshot of one series.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub today: PnlWindow,
    pub mtd: PnlWindow,
    pub total: PnlWindow,
}
