use super::{DailyEntry, PnlWindow, Summary};
use chrono::{Datelike, NaiveDate};

/// Today / MTD / total windows for a chronologically sorted series.
///
/// `today` is the last entry, whatever its date. `mtd` covers entries in
/// `now`'s calendar month and year. Percents for `mtd` and `total` are
/// recomputed from the summed pnl, never summed from per-day percents.
/// Empty input yields an all-zero summary.
pub fn summarize(series: &[DailyEntry], capital: f64, now: NaiveDate) -> Summary {
    let today = series
        .last()
        .map(|e| PnlWindow::from_pnl(e.pnl, capital))
        .unwrap_or_default();

    let mtd_pnl: f64 = series
        .iter()
        .filter(|e| e.date.year() == now.year() && e.date.month() == now.month())
        .map(|e| e.pnl)
        .sum();

    let total_pnl: f64 = series.iter().map(|e| e.pnl).sum();

    Summary {
        today,
        mtd: PnlWindow::from_pnl(mtd_pnl, capital),
        total: PnlWindow::from_pnl(total_pnl, capital),
    }
}
