/// Daily series normalization.
///
/// Turns raw scraped or hand-entered rows into a canonical series:
/// one entry per calendar date, ascending, with `percent` always derived
/// from `pnl` and the capital base. Same-date rows are summed.
/// Rows with an unparsable date or a non-numeric pnl are dropped and
/// reported in `skipped`. Pure function.
use super::{percent_of, DailyEntry, RawEntry};
use chrono::NaiveDate;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Textual formats seen on broker P&L pages, tried after the numeric ones.
const TEXT_FORMATS: [&str; 5] = ["%d %b %Y", "%d-%b-%Y", "%b %d, %Y", "%b %d %Y", "%d %B, %Y"];

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SkippedEntry {
    pub date: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Normalized {
    pub series: Vec<DailyEntry>,
    pub skipped: Vec<SkippedEntry>,
}

/// Normalize raw rows against `capital`. Never fails.
pub fn normalize(raw: &[RawEntry], capital: f64) -> Normalized {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut skipped = Vec::new();

    for entry in raw {
        let Some(date) = parse_date(&entry.date) else {
            tracing::warn!(date = %entry.date, "skipping entry with unparsable date");
            skipped.push(SkippedEntry {
                date: entry.date.clone(),
                reason: "unparsable date",
            });
            continue;
        };
        let Some(pnl) = entry.pnl.as_ref().and_then(|p| p.value()) else {
            tracing::warn!(date = %entry.date, "skipping entry with non-numeric pnl");
            skipped.push(SkippedEntry {
                date: entry.date.clone(),
                reason: "non-numeric pnl",
            });
            continue;
        };
        *by_date.entry(date).or_insert(0.0) += pnl;
    }

    Normalized {
        series: rebuild(by_date, capital),
        skipped,
    }
}

/// Re-derive an already typed series against a (possibly different) capital.
/// Same guarantees as [`normalize`]: unique dates, ascending, percent recomputed.
pub fn renormalize(series: &[DailyEntry], capital: f64) -> Vec<DailyEntry> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for e in series.iter().filter(|e| e.pnl.is_finite()) {
        *by_date.entry(e.date).or_insert(0.0) += e.pnl;
    }
    rebuild(by_date, capital)
}

fn rebuild(by_date: BTreeMap<NaiveDate, f64>, capital: f64) -> Vec<DailyEntry> {
    by_date
        .into_iter()
        .map(|(date, pnl)| DailyEntry {
            date,
            pnl,
            percent: percent_of(pnl, capital),
        })
        .collect()
}

/// Parse a calendar date from the formats the scrapers and hand-entered
/// files produce. Time-of-day and offsets are ignored; the date is taken
/// as written.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(date) = parse_numeric(s) {
        return Some(date);
    }

    // "2025-01-02T00:00:00.000Z", "2025-01-02 09:15:00"
    if let Some((head, _)) = s.split_once(['T', ' ']) {
        if let Some(date) = parse_numeric(head) {
            return Some(date);
        }
    }

    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// `YYYY-MM-DD`, `YYYY/MM/DD`, `DD/MM/YYYY`, `DD-MM-YYYY`, `DD/MM/YY`.
fn parse_numeric(s: &str) -> Option<NaiveDate> {
    let parts: SmallVec<[&str; 3]> = s.split(['-', '/', '.']).collect();
    if parts.len() != 3
        || !parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 4 && p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let (y, m, d) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else if parts[2].len() == 4 || parts[2].len() == 2 {
        (parts[2], parts[1], parts[0])
    } else {
        return None;
    };
    if m.len() > 2 || d.len() > 2 {
        return None;
    }

    let mut year: i32 = y.parse().ok()?;
    if y.len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
}
