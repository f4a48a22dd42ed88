use super::{percent_of, DailyEntry};
use chrono::{Datelike, NaiveDate, Weekday};

/// One row of the cumulative P&L table / equity curve chart.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub pnl: f64,
    pub percent: f64,
    pub cumulative_pnl: f64,
    pub cumulative_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Monthly,
    Quarterly,
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            other => Err(format!("unknown period '{other}'")),
        }
    }
}

/// Aggregated P&L for one calendar month or quarter.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRollup {
    /// Sortable key: `2025-01` or `2025-Q1`.
    pub key: String,
    /// Display label: `Jan 2025` or `Q1 2025`.
    pub label: String,
    pub pnl: f64,
    pub percent: f64,
    pub days: u32,
    pub win_days: u32,
    pub loss_days: u32,
    /// Equity curve value at the bucket's last day.
    pub cumulative_pnl: f64,
}

/// Cumulative curve starting from 0. Input must be sorted ascending.
pub fn equity_curve(series: &[DailyEntry], capital: f64) -> Vec<EquityPoint> {
    let mut cumulative = 0.0;
    series
        .iter()
        .map(|e| {
            cumulative += e.pnl;
            EquityPoint {
                date: e.date,
                pnl: e.pnl,
                percent: percent_of(e.pnl, capital),
                cumulative_pnl: cumulative,
                cumulative_percent: percent_of(cumulative, capital),
            }
        })
        .collect()
}

/// Bucket a sorted series by month or quarter. Only periods with at least
/// one entry appear, ascending.
pub fn rollup(series: &[DailyEntry], capital: f64, period: Period) -> Vec<PeriodRollup> {
    let mut out: Vec<PeriodRollup> = Vec::new();
    let mut cumulative = 0.0;

    for e in series {
        cumulative += e.pnl;
        let (key, label) = bucket(e.date, period);

        let needs_new = out.last().map_or(true, |last| last.key != key);
        if needs_new {
            out.push(PeriodRollup {
                key,
                label,
                pnl: 0.0,
                percent: 0.0,
                days: 0,
                win_days: 0,
                loss_days: 0,
                cumulative_pnl: 0.0,
            });
        }
        let Some(current) = out.last_mut() else { continue };
        current.pnl += e.pnl;
        current.days += 1;
        if e.pnl > 0.0 {
            current.win_days += 1;
        } else if e.pnl < 0.0 {
            current.loss_days += 1;
        }
        current.cumulative_pnl = cumulative;
    }

    for r in &mut out {
        r.percent = percent_of(r.pnl, capital);
    }
    out
}

fn bucket(date: NaiveDate, period: Period) -> (String, String) {
    match period {
        Period::Monthly => (
            format!("{}-{:02}", date.year(), date.month()),
            date.format("%b %Y").to_string(),
        ),
        Period::Quarterly => {
            let q = (date.month0() / 3) + 1;
            (format!("{}-Q{q}", date.year()), format!("Q{q} {}", date.year()))
        }
    }
}

/// Drop Saturday/Sunday entries.
pub fn weekdays_only(series: &[DailyEntry]) -> Vec<DailyEntry> {
    series
        .iter()
        .filter(|e| !matches!(e.date.weekday(), Weekday::Sat | Weekday::Sun))
        .copied()
        .collect()
}
