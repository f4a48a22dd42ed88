/// Multi-entity combination.
///
/// One entity passes through with its own capital and a resolved display
/// name. Several entities are merged into a pseudo-entity: capital is the
/// sum of registered capitals, daily pnl is summed per calendar date, and
/// every percent is recomputed against the combined capital. The summary
/// is always rebuilt from the combined daily series, never from
/// per-entity totals.
use super::normalize::renormalize;
use super::summary::summarize;
use super::{percent_of, DailyEntry, Entity, Summary, DEFAULT_ENTITY_LABEL};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Names scrapers emit when they failed to find the real account holder.
const PLACEHOLDER_NAMES: [&str; 2] = ["no clients added", "verified p&l performance"];

/// One entity's normalized series plus whatever the fetch reported about it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySeries {
    pub entity: Entity,
    pub series: Vec<DailyEntry>,
    /// Capital reported alongside the data, if any.
    pub capital: Option<f64>,
    /// Name extracted from the source page, if any.
    pub fetched_name: Option<String>,
    pub info: Option<String>,
}

impl EntitySeries {
    /// Capital the series is measured against: the reported one when
    /// usable, otherwise the registered one.
    pub fn effective_capital(&self) -> f64 {
        self.capital
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(self.entity.capital)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedView {
    pub daily: Vec<DailyEntry>,
    pub summary: Summary,
    pub capital: f64,
    pub client_name: String,
    pub client_info: String,
    pub entity_ids: Vec<String>,
}

impl CombinedView {
    pub fn empty() -> Self {
        Self {
            daily: Vec::new(),
            summary: Summary::default(),
            capital: 0.0,
            client_name: DEFAULT_ENTITY_LABEL.to_string(),
            client_info: "No clients selected".to_string(),
            entity_ids: Vec::new(),
        }
    }
}

pub fn combine(inputs: &[EntitySeries], now: NaiveDate) -> CombinedView {
    match inputs {
        [] => CombinedView::empty(),
        [single] => pass_through(single, now),
        many => merge(many, now),
    }
}

fn pass_through(input: &EntitySeries, now: NaiveDate) -> CombinedView {
    let capital = input.effective_capital();
    let daily = renormalize(&input.series, capital);
    let summary = summarize(&daily, capital, now);

    let client_info = input
        .info
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| capital_label(capital));

    CombinedView {
        daily,
        summary,
        capital,
        client_name: resolve_name(input.fetched_name.as_deref(), &input.entity.name),
        client_info,
        entity_ids: vec![input.entity.id.clone()],
    }
}

fn merge(inputs: &[EntitySeries], now: NaiveDate) -> CombinedView {
    let capital: f64 = inputs.iter().map(|i| i.entity.capital).sum();

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for input in inputs {
        for day in &input.series {
            *by_date.entry(day.date).or_insert(0.0) += day.pnl;
        }
    }

    let daily: Vec<DailyEntry> = by_date
        .into_iter()
        .map(|(date, pnl)| DailyEntry {
            date,
            pnl,
            percent: percent_of(pnl, capital),
        })
        .collect();

    // Rebuilt from the combined daily data so total == Σ combined pnl exactly.
    let summary = summarize(&daily, capital, now);

    let names: Vec<&str> = inputs.iter().map(|i| i.entity.name.as_str()).collect();

    CombinedView {
        daily,
        summary,
        capital,
        client_name: format!("{} Clients (Combined)", inputs.len()),
        client_info: format!("{} | {}", capital_label(capital), names.join(", ")),
        entity_ids: inputs.iter().map(|i| i.entity.id.clone()).collect(),
    }
}

/// Pick the display name: a real fetched name, else the registered name,
/// else the default label.
pub fn resolve_name(fetched: Option<&str>, registered: &str) -> String {
    [fetched, Some(registered)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|n| !n.is_empty() && !is_placeholder(n))
        .unwrap_or(DEFAULT_ENTITY_LABEL)
        .to_string()
}

/// Generic labels ("Client 2", "client-1", "No clients added", ...).
pub fn is_placeholder(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    lower.starts_with("client") || PLACEHOLDER_NAMES.contains(&lower.as_str())
}

/// "Capital: ₹1.00Cr" / "Capital: ₹50.00L".
pub fn capital_label(capital: f64) -> String {
    if capital >= 10_000_000.0 {
        format!("Capital: ₹{:.2}Cr", capital / 10_000_000.0)
    } else {
        format!("Capital: ₹{:.2}L", capital / 100_000.0)
    }
}
