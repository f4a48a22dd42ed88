/// Performance metrics over a daily series.
///
/// Everything is derived from the equity curve (cumulative pnl in date
/// order, starting at 0) in a single forward pass. Pure function of the
/// series and capital; an empty series yields `Metrics::default()`.
///
/// Sign convention: `max_drawdown` and `max_drawdown_percent` are signed
/// and always <= 0.
use super::{percent_of, DailyEntry};
use chrono::NaiveDate;
use statrs::statistics::{Data, Distribution};

/// Trading days per year, for annualising the daily Sharpe ratio.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub max_drawdown: f64,
    pub max_drawdown_percent: f64,
    /// Peak the worst drawdown started from.
    pub max_drawdown_start: Option<NaiveDate>,
    /// Trough of the worst drawdown.
    pub max_drawdown_end: Option<NaiveDate>,
    pub max_profit: f64,
    pub max_profit_percent: f64,
    pub max_profit_date: Option<NaiveDate>,
    pub winning_streak: u32,
    pub losing_streak: u32,
    pub max_loss_per_day: f64,
    pub max_loss_date: Option<NaiveDate>,
    pub max_gain_per_day: f64,
    pub max_gain_date: Option<NaiveDate>,
    pub total_win_days: u32,
    pub total_loss_days: u32,
    pub total_neutral_days: u32,
    pub total_trading_days: u32,
    pub winning_percentage: f64,
    pub average_profit_per_day: f64,
    /// Signed: <= 0.
    pub average_loss_per_day: f64,
    /// Gross wins over gross losses. `None` when there are no losing days.
    pub profit_factor: Option<f64>,
    pub expectancy: f64,
    /// Sample std-dev of daily percent returns.
    pub daily_volatility: f64,
    pub sharpe_ratio: f64,
}

pub fn compute_metrics(series: &[DailyEntry], capital: f64) -> Metrics {
    if series.is_empty() {
        return Metrics::default();
    }

    let mut m = Metrics::default();

    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut peak_date: Option<NaiveDate> = None;
    let mut drawdown_magnitude = 0.0_f64;

    let mut win_run = 0u32;
    let mut loss_run = 0u32;

    let mut gross_profit = 0.0_f64;
    let mut gross_loss = 0.0_f64;

    for day in series {
        cumulative += day.pnl;

        if cumulative > peak {
            peak = cumulative;
            peak_date = Some(day.date);
        }
        let drawdown = peak - cumulative;
        if drawdown > drawdown_magnitude {
            drawdown_magnitude = drawdown;
            m.max_drawdown_start = peak_date;
            m.max_drawdown_end = Some(day.date);
        }

        if cumulative > m.max_profit {
            m.max_profit = cumulative;
            m.max_profit_date = Some(day.date);
        }

        if day.pnl > 0.0 {
            win_run += 1;
            loss_run = 0;
            m.winning_streak = m.winning_streak.max(win_run);
            m.total_win_days += 1;
            gross_profit += day.pnl;
            if day.pnl > m.max_gain_per_day {
                m.max_gain_per_day = day.pnl;
                m.max_gain_date = Some(day.date);
            }
        } else if day.pnl < 0.0 {
            loss_run += 1;
            win_run = 0;
            m.losing_streak = m.losing_streak.max(loss_run);
            m.total_loss_days += 1;
            gross_loss += day.pnl;
            if day.pnl < m.max_loss_per_day {
                m.max_loss_per_day = day.pnl;
                m.max_loss_date = Some(day.date);
            }
        } else {
            win_run = 0;
            loss_run = 0;
            m.total_neutral_days += 1;
        }
    }

    m.total_trading_days = series.len() as u32;
    let days = m.total_trading_days as f64;

    if drawdown_magnitude > 0.0 {
        m.max_drawdown = -drawdown_magnitude;
        m.max_drawdown_percent = -percent_of(drawdown_magnitude, capital);
    }
    m.max_profit_percent = percent_of(m.max_profit, capital);

    m.winning_percentage = m.total_win_days as f64 / days * 100.0;
    if m.total_win_days > 0 {
        m.average_profit_per_day = gross_profit / m.total_win_days as f64;
    }
    if m.total_loss_days > 0 {
        m.average_loss_per_day = gross_loss / m.total_loss_days as f64;
        m.profit_factor = Some(gross_profit / gross_loss.abs());
    }

    let win_rate = m.total_win_days as f64 / days;
    let loss_rate = m.total_loss_days as f64 / days;
    m.expectancy = m.average_profit_per_day * win_rate - m.average_loss_per_day.abs() * loss_rate;

    let (volatility, sharpe) = daily_risk(series, capital);
    m.daily_volatility = volatility;
    m.sharpe_ratio = sharpe;

    m
}

/// (std-dev, annualised Sharpe) of daily percent returns. Zeros with fewer
/// than two days or a flat return series.
fn daily_risk(series: &[DailyEntry], capital: f64) -> (f64, f64) {
    if series.len() < 2 {
        return (0.0, 0.0);
    }
    let returns: Vec<f64> = series.iter().map(|e| percent_of(e.pnl, capital)).collect();
    let data = Data::new(returns);
    let (Some(mean), Some(std)) = (data.mean(), data.std_dev()) else {
        return (0.0, 0.0);
    };
    if !std.is_finite() || std < 1e-12 {
        return (0.0, 0.0);
    }
    (std, mean / std * TRADING_DAYS_PER_YEAR.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPITAL: f64 = 10_000_000.0;

    fn series(pnls: &[f64]) -> Vec<DailyEntry> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        pnls.iter()
            .enumerate()
            .map(|(i, &pnl)| DailyEntry {
                date: start + chrono::Days::new(i as u64),
                pnl,
                percent: percent_of(pnl, CAPITAL),
            })
            .collect()
    }

    fn date(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 1, d)
    }

    #[test]
    fn test_empty_series_all_zero() {
        let m = compute_metrics(&[], CAPITAL);
        assert_eq!(m, Metrics::default());
        assert_eq!(m.max_drawdown, 0.0);
        assert!(m.max_loss_date.is_none());
        assert!(m.profit_factor.is_none());
    }

    #[test]
    fn test_no_drawdown_is_positive_zero() {
        let m = compute_metrics(&series(&[5.0]), CAPITAL);
        assert!(m.max_drawdown.is_sign_positive() && m.max_drawdown == 0.0);
        assert!(m.max_drawdown_percent.is_sign_positive());
        let json = serde_json::to_value(&m).expect("serialize");
        assert_eq!(json["maxDrawdown"].to_string(), "0.0");
        assert_eq!(json["maxDrawdownPercent"].to_string(), "0.0");
    }

    #[test]
    fn test_scenario_gain_then_loss() {
        let m = compute_metrics(&series(&[100000.0, -50000.0]), CAPITAL);
        assert_eq!(m.max_profit, 100000.0);
        assert_eq!(m.max_drawdown, -50000.0);
        assert!((m.max_drawdown_percent + 0.5).abs() < 1e-9);
        assert_eq!(m.max_drawdown_start, date(1));
        assert_eq!(m.max_drawdown_end, date(2));
        assert_eq!(m.winning_streak, 1);
        assert_eq!(m.losing_streak, 1);
        assert_eq!(m.max_loss_per_day, -50000.0);
        assert_eq!(m.max_loss_date, date(2));
        assert_eq!(m.total_trading_days, 2);
        assert!((m.winning_percentage - 50.0).abs() < 1e-9);
        assert_eq!(m.profit_factor, Some(2.0));
    }

    #[test]
    fn test_monotonic_curve_has_no_drawdown() {
        let m = compute_metrics(&series(&[10.0, 0.0, 25.0, 5.0, 0.0]), CAPITAL);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.max_drawdown_percent, 0.0);
        assert!(m.max_drawdown_start.is_none());
        assert_eq!(m.max_profit, 40.0);
        assert_eq!(m.max_profit_date, date(4));
    }

    #[test]
    fn test_drawdown_from_initial_zero() {
        let m = compute_metrics(&series(&[-300.0, 100.0, -50.0]), CAPITAL);
        assert_eq!(m.max_drawdown, -300.0);
        assert!(m.max_drawdown_start.is_none(), "peak is the starting zero");
        assert_eq!(m.max_drawdown_end, date(1));
        assert_eq!(m.max_profit, 0.0);
        assert!(m.max_drawdown <= 0.0);
    }

    #[test]
    fn test_drawdown_peak_to_trough() {
        // curve: 100, 300, 200, 50, 400, 350
        let m = compute_metrics(&series(&[100.0, 200.0, -100.0, -150.0, 350.0, -50.0]), CAPITAL);
        assert_eq!(m.max_drawdown, -250.0);
        assert_eq!(m.max_drawdown_start, date(2));
        assert_eq!(m.max_drawdown_end, date(4));
        assert_eq!(m.max_profit, 400.0);
    }

    #[test]
    fn test_streaks_reset_on_flat_day() {
        let m = compute_metrics(&series(&[1.0, 1.0, 0.0, 1.0, -1.0, -1.0, -1.0, 0.0, -1.0]), CAPITAL);
        assert_eq!(m.winning_streak, 2);
        assert_eq!(m.losing_streak, 3);
        assert!(m.winning_streak <= m.total_trading_days);
        assert!(m.losing_streak <= m.total_trading_days);
    }

    #[test]
    fn test_day_counts_and_averages() {
        let m = compute_metrics(&series(&[300.0, -100.0, 0.0, 100.0, -300.0]), CAPITAL);
        assert_eq!(m.total_win_days, 2);
        assert_eq!(m.total_loss_days, 2);
        assert_eq!(m.total_neutral_days, 1);
        assert_eq!(m.average_profit_per_day, 200.0);
        assert_eq!(m.average_loss_per_day, -200.0);
        assert!((m.winning_percentage - 40.0).abs() < 1e-9);
        assert_eq!(m.max_gain_per_day, 300.0);
        assert_eq!(m.max_gain_date, date(1));
        assert_eq!(m.max_loss_per_day, -300.0);
        assert_eq!(m.max_loss_date, date(5));
        assert_eq!(m.profit_factor, Some(1.0));
        assert!(m.expectancy.abs() < 1e-9);
    }

    #[test]
    fn test_expectancy_is_mean_daily_pnl() {
        let pnls = [5000.0, -2000.0, 3000.0, 0.0, -1000.0, 7000.0];
        let m = compute_metrics(&series(&pnls), CAPITAL);
        let mean = pnls.iter().sum::<f64>() / pnls.len() as f64;
        assert!((m.expectancy - mean).abs() < 1e-6, "{} vs {mean}", m.expectancy);
    }

    #[test]
    fn test_all_winning_days_have_no_profit_factor() {
        let m = compute_metrics(&series(&[10.0, 20.0]), CAPITAL);
        assert!(m.profit_factor.is_none());
        assert_eq!(m.average_loss_per_day, 0.0);
        assert_eq!(m.max_loss_per_day, 0.0);
        assert!(m.max_loss_date.is_none());
    }

    #[test]
    fn test_risk_stats() {
        let flat = compute_metrics(&series(&[1000.0, 1000.0, 1000.0]), CAPITAL);
        assert_eq!(flat.daily_volatility, 0.0);
        assert_eq!(flat.sharpe_ratio, 0.0);

        let single = compute_metrics(&series(&[1000.0]), CAPITAL);
        assert_eq!(single.daily_volatility, 0.0);

        let m = compute_metrics(&series(&[100000.0, -50000.0, 20000.0, 30000.0]), CAPITAL);
        assert!(m.daily_volatility > 0.0);
        assert!(m.sharpe_ratio > 0.0, "positive mean should give positive sharpe");
    }
}
