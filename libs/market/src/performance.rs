use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{Error, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::live_data::{MAX_CRYPTO_DAYS, MarketData};
use crate::models::{AssetKind, Bar, Period, Point};
use crate::sample::{compound, sample_dates, sample_market_data, sample_returns, sample_rng};

pub const TRADING_DAYS: f64 = 252.0;

/// Return-scaling presets. None of these trade; each one rescales the
/// equal-weight portfolio's daily returns by a fixed factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Momentum,
    Value,
    MeanReversion,
    Custom,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Momentum,
        Strategy::Value,
        Strategy::MeanReversion,
        Strategy::Custom,
    ];

    pub fn multiplier(&self) -> f64 {
        match self {
            Strategy::Momentum => 1.2,
            Strategy::Value => 0.9,
            Strategy::MeanReversion => -0.8,
            Strategy::Custom => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Momentum => "momentum",
            Strategy::Value => "value",
            Strategy::MeanReversion => "mean_reversion",
            Strategy::Custom => "custom",
        }
    }

    /// Translation key of the display name.
    pub fn label_key(&self) -> &'static str {
        match self {
            Strategy::Momentum => "momentum_strategy",
            Strategy::Value => "value_strategy",
            Strategy::MeanReversion => "mean_reversion",
            Strategy::Custom => "custom_strategy",
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match norm.trim_end_matches("_strategy") {
            "momentum" => Ok(Strategy::Momentum),
            "value" => Ok(Strategy::Value),
            "mean_reversion" => Ok(Strategy::MeanReversion),
            "custom" => Ok(Strategy::Custom),
            _ => bail!("unknown strategy: {s}"),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub equity: Vec<Point>,
    pub drawdown: Vec<Point>,
    pub returns: Vec<Point>,

    pub total_return: f64,
    pub total_return_delta: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sharpe_delta: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub drawdown_delta: f64,
    pub calmar_ratio: f64,
    pub win_rate: f64,
    pub win_rate_delta: f64,
    pub profit_factor: f64,
    pub total_trades: usize,

    /// True when the numbers come from the seeded demo series.
    pub is_sample: bool,

    /// Per-symbol problems met while collecting data.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestSummary {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub equity_curve: Vec<Point>,
}

#[derive(Debug, Clone)]
pub struct PerformanceRequest {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub strategy: Strategy,
    pub initial_capital: f64,
    pub asset: AssetKind,
}

/// Snapshot numbers shown under a market chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketStats {
    pub current_price: f64,
    /// Percent change of the last close against the previous one.
    pub daily_return: Option<f64>,
    /// Annualized close-to-close volatility, in percent.
    pub volatility: Option<f64>,
    pub avg_volume: f64,
}

impl MarketStats {
    pub fn from_bars(bars: &[Bar]) -> Option<Self> {
        let last = bars.last()?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let daily_return = (bars.len() >= 2).then(|| {
            let prev = bars[bars.len() - 2].close;
            (last.close / prev - 1.0) * 100.0
        });
        let volatility = (bars.len() >= 2)
            .then(|| sample_std(&pct_change(&closes)) * TRADING_DAYS.sqrt() * 100.0);

        Some(Self {
            current_price: last.close,
            daily_return,
            volatility,
            avg_volume: mean(&bars.iter().map(|b| b.volume).collect::<Vec<_>>()),
        })
    }
}

/// Fetch closes for every symbol, build an equal-weight portfolio, rescale its
/// returns by the strategy and compute risk/return statistics.
///
/// With no `source` the seeded sample market data stands in for every symbol.
/// Falls back to [`sample_performance`] when nothing usable was fetched.
pub async fn calculate_real_performance(
    source: Option<&dyn MarketData>,
    req: &PerformanceRequest,
) -> Result<PerformanceReport> {
    let span = (req.end - req.start).num_days().max(1);
    let mut notes = Vec::new();
    let mut series: Vec<Vec<Bar>> = Vec::new();

    for symbol in &req.symbols {
        let Some(source) = source else {
            series.push(sample_market_data()?);
            continue;
        };

        let fetched = match req.asset {
            AssetKind::Crypto => {
                let mut days = span as u32;
                if days > MAX_CRYPTO_DAYS {
                    days = MAX_CRYPTO_DAYS;
                    notes.push(format!(
                        "CoinGecko serves at most {MAX_CRYPTO_DAYS} days, range shortened"
                    ));
                }
                source.get_crypto_history(symbol, days).await
            }
            AssetKind::Stock => {
                source
                    .get_stock_data(symbol, Period::covering_days(span))
                    .await
            }
        };

        match fetched {
            Ok(bars) if !bars.is_empty() => {
                info!(%symbol, points = bars.len(), "collected closes");
                series.push(bars);
            }
            Ok(_) => notes.push(format!("{symbol}: returned data is empty")),
            Err(e) => {
                warn!(%symbol, error = ?e, "failed to collect closes");
                notes.push(format!("{symbol}: failed to fetch data"));
            }
        }
    }

    if series.is_empty() {
        warn!("no data available, using sample data");
        notes.push("Unable to fetch any data".to_string());
        return Ok(with_notes(sample_performance()?, notes));
    }

    let portfolio = equal_weight(&series);
    let returns = returns_of(&portfolio);
    if returns.is_empty() {
        notes.push("Not enough data to calculate returns".to_string());
        return Ok(with_notes(sample_performance()?, notes));
    }

    let adjusted: Vec<Point> = returns
        .iter()
        .map(|p| Point::new(p.timestamp, p.value * req.strategy.multiplier()))
        .collect();

    Ok(with_notes(compute_report(&adjusted, req.initial_capital), notes))
}

fn with_notes(mut report: PerformanceReport, notes: Vec<String>) -> PerformanceReport {
    report.notes.extend(notes);
    report
}

/// Mean close per calendar day, over the days every series covers.
///
/// A series with several bars on one day (CoinGecko appends an intraday "now"
/// point) contributes its last close of that day.
pub fn equal_weight(series: &[Vec<Bar>]) -> Vec<Point> {
    if series.is_empty() {
        return Vec::new();
    }

    let daily: Vec<BTreeMap<NaiveDate, f64>> = series
        .iter()
        .map(|bars| {
            bars.iter()
                .map(|b| (b.timestamp.date_naive(), b.close))
                .collect()
        })
        .collect();

    let (first, rest) = daily.split_at(1);
    first[0]
        .iter()
        .filter_map(|(day, close)| {
            let mut sum = *close;
            for other in rest {
                sum += other.get(day)?;
            }
            let ts = day.and_hms_opt(0, 0, 0)?.and_utc();
            Some(Point::new(ts, sum / daily.len() as f64))
        })
        .collect()
}

/// Simple returns between consecutive points; the first point has none.
pub fn returns_of(prices: &[Point]) -> Vec<Point> {
    prices
        .windows(2)
        .map(|w| Point::new(w[1].timestamp, w[1].value / w[0].value - 1.0))
        .filter(|p| p.value.is_finite())
        .collect()
}

pub fn compute_report(returns: &[Point], initial_capital: f64) -> PerformanceReport {
    let r: Vec<f64> = returns.iter().map(|p| p.value).collect();
    let n = r.len();

    let equity_values = compound(initial_capital, &r);
    let equity: Vec<Point> = returns
        .iter()
        .zip(&equity_values)
        .map(|(p, &v)| Point::new(p.timestamp, v))
        .collect();
    let drawdown = drawdown_of(&equity);

    let final_equity = equity_values.last().copied().unwrap_or(initial_capital);
    let total_return = final_equity / initial_capital - 1.0;
    let annualized_return = if n > 0 {
        (1.0 + total_return).powf(TRADING_DAYS / n as f64) - 1.0
    } else {
        0.0
    };

    let volatility = sample_std(&r) * TRADING_DAYS.sqrt();
    let sharpe_ratio = ratio(annualized_return, volatility);

    let max_drawdown = drawdown.iter().map(|p| p.value).fold(0.0, f64::min);

    let losses: Vec<f64> = r.iter().copied().filter(|x| *x < 0.0).collect();
    let gains: Vec<f64> = r.iter().copied().filter(|x| *x > 0.0).collect();

    let downside = if losses.is_empty() {
        volatility
    } else {
        sample_std(&losses) * TRADING_DAYS.sqrt()
    };
    let sortino_ratio = ratio(annualized_return, downside);

    let win_rate = if n > 0 {
        gains.len() as f64 / n as f64
    } else {
        0.0
    };

    let gross_loss: f64 = losses.iter().sum::<f64>().abs();
    let profit_factor = ratio(gains.iter().sum(), gross_loss);

    PerformanceReport {
        equity,
        drawdown,
        returns: returns.to_vec(),
        total_return,
        total_return_delta: 0.0,
        annualized_return,
        volatility,
        sharpe_ratio,
        sharpe_delta: 0.0,
        sortino_ratio,
        max_drawdown,
        drawdown_delta: 0.0,
        calmar_ratio: ratio(annualized_return, max_drawdown.abs()),
        win_rate,
        win_rate_delta: 0.0,
        profit_factor,
        total_trades: n,
        is_sample: false,
        notes: Vec::new(),
    }
}

/// Demo performance over the seeded sample calendar.
pub fn sample_performance() -> Result<PerformanceReport> {
    let dates = sample_dates();
    let mut rng = sample_rng();
    let r = sample_returns(&mut rng, dates.len())?;

    let equity_values = compound(100_000.0, &r);
    let equity: Vec<Point> = dates
        .iter()
        .zip(&equity_values)
        .map(|(&ts, &v)| Point::new(ts, v))
        .collect();
    let drawdown = drawdown_of(&equity);

    let (first, last) = match (equity_values.first(), equity_values.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => bail!("empty sample calendar"),
    };

    let total_return = last / first - 1.0;
    let annualized_return = total_return * TRADING_DAYS / r.len() as f64;
    let volatility = population_std(&r) * TRADING_DAYS.sqrt();
    let sharpe_ratio = ratio(annualized_return, volatility);
    let max_drawdown = drawdown.iter().map(|p| p.value).fold(0.0, f64::min);

    Ok(PerformanceReport {
        returns: dates.iter().zip(&r).map(|(&ts, &v)| Point::new(ts, v)).collect(),
        equity,
        drawdown,
        total_return,
        total_return_delta: 0.05,
        annualized_return,
        volatility,
        sharpe_ratio,
        sharpe_delta: 0.1,
        sortino_ratio: sharpe_ratio * 1.1,
        max_drawdown,
        drawdown_delta: 0.02,
        calmar_ratio: ratio(annualized_return, max_drawdown.abs()),
        win_rate: 0.58,
        win_rate_delta: 0.03,
        profit_factor: 1.45,
        total_trades: 156,
        is_sample: true,
        notes: Vec::new(),
    })
}

pub fn sample_backtest() -> Result<BacktestSummary> {
    Ok(BacktestSummary {
        total_return: 0.25,
        sharpe_ratio: 1.8,
        max_drawdown: -0.12,
        win_rate: 0.65,
        total_trades: 89,
        equity_curve: sample_performance()?.equity,
    })
}

/// `(equity - running peak) / running peak` at every point.
pub fn drawdown_of(equity: &[Point]) -> Vec<Point> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|p| {
            peak = peak.max(p.value);
            Point::new(p.timestamp, (p.value - peak) / peak)
        })
        .collect()
}

pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|x| x.is_finite())
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with Bessel's correction; 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// `num / den`, or 0 when the denominator is not positive.
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn bar(day: u32, close: f64) -> Bar {
        Bar::from_price(ts(day), close)
    }

    fn points(values: &[f64]) -> Vec<Point> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Point::new(ts(i as u32 + 1), v))
            .collect()
    }

    #[test]
    fn strategy_parses_display_names() {
        assert_eq!("Momentum Strategy".parse::<Strategy>().unwrap(), Strategy::Momentum);
        assert_eq!("Mean Reversion".parse::<Strategy>().unwrap(), Strategy::MeanReversion);
        assert_eq!("value".parse::<Strategy>().unwrap(), Strategy::Value);
        assert_eq!("mean-reversion".parse::<Strategy>().unwrap(), Strategy::MeanReversion);
        assert!("arbitrage".parse::<Strategy>().is_err());
    }

    #[test]
    fn equal_weight_keeps_only_shared_days() {
        let a = vec![bar(1, 10.0), bar(2, 20.0), bar(3, 30.0)];
        let b = vec![bar(2, 40.0), bar(3, 50.0), bar(4, 60.0)];
        let p = equal_weight(&[a, b]);
        let values: Vec<f64> = p.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![30.0, 40.0]);
        assert_eq!(p[0].timestamp, ts(2));
    }

    #[test]
    fn equal_weight_folds_intraday_tail_points() {
        let at = |day: u32, h: u32, ms: i64, close: f64| {
            let t = Utc.with_ymd_and_hms(2024, 1, day, h, 0, 0).unwrap()
                + chrono::Duration::milliseconds(ms);
            Bar::from_price(t, close)
        };
        let btc = vec![at(1, 0, 0, 60_000.0), at(2, 0, 0, 61_000.0), at(2, 1, 0, 61_500.0)];
        let eth = vec![at(1, 0, 0, 3_000.0), at(2, 0, 0, 3_050.0), at(2, 1, 333, 3_060.0)];

        let p = equal_weight(&[btc, eth]);
        let values: Vec<f64> = p.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![31_500.0, 32_280.0]);

        let r = returns_of(&p);
        assert_eq!(r.len(), 1);
        assert!((r[0].value - (32_280.0 / 31_500.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn equal_weight_of_single_series_is_its_closes() {
        let p = equal_weight(&[vec![bar(1, 5.0), bar(2, 6.0)]]);
        assert_eq!(p.iter().map(|p| p.value).collect::<Vec<_>>(), vec![5.0, 6.0]);
        assert!(equal_weight(&[]).is_empty());
    }

    #[test]
    fn returns_drop_first_point() {
        let r = returns_of(&points(&[100.0, 110.0, 99.0]));
        assert_eq!(r.len(), 2);
        assert!((r[0].value - 0.1).abs() < 1e-12);
        assert!((r[1].value + 0.1).abs() < 1e-12);
        assert_eq!(r[0].timestamp, ts(2));
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let dd = drawdown_of(&points(&[100.0, 120.0, 90.0, 130.0]));
        let values: Vec<f64> = dd.iter().map(|p| p.value).collect();
        assert_eq!(values[0], 0.0);
        assert_eq!(values[1], 0.0);
        assert!((values[2] + 0.25).abs() < 1e-12);
        assert_eq!(values[3], 0.0);
    }

    #[test]
    fn report_metrics_match_hand_computation() {
        let returns = points(&[0.1, -0.05, 0.02, -0.01]);
        let report = compute_report(&returns, 1000.0);

        let expected_final = 1000.0 * 1.1 * 0.95 * 1.02 * 0.99;
        assert!((report.equity.last().unwrap().value - expected_final).abs() < 1e-9);
        assert!((report.total_return - (expected_final / 1000.0 - 1.0)).abs() < 1e-12);

        let ann = (1.0 + report.total_return).powf(252.0 / 4.0) - 1.0;
        assert!((report.annualized_return - ann).abs() < 1e-9);

        assert_eq!(report.win_rate, 0.5);
        assert!((report.profit_factor - 0.12 / 0.06).abs() < 1e-9);
        assert_eq!(report.total_trades, 4);
        assert!(report.max_drawdown < 0.0);
        assert!(!report.is_sample);

        let vol = sample_std(&[0.1, -0.05, 0.02, -0.01]) * 252f64.sqrt();
        assert!((report.volatility - vol).abs() < 1e-12);
        assert!((report.sharpe_ratio - ann / vol).abs() < 1e-9);
    }

    #[test]
    fn report_without_losses_has_zero_profit_factor_and_drawdown() {
        let report = compute_report(&points(&[0.01, 0.02, 0.03]), 100.0);
        assert_eq!(report.profit_factor, 0.0);
        assert_eq!(report.max_drawdown, 0.0);
        assert_eq!(report.calmar_ratio, 0.0);
        assert_eq!(report.win_rate, 1.0);
        // no downside: Sortino falls back to total volatility
        assert!((report.sortino_ratio - report.sharpe_ratio).abs() < 1e-12);
    }

    #[test]
    fn sample_std_uses_bessel_correction() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((sample_std(&v) - 1.2909944487358056).abs() < 1e-12);
        assert!((population_std(&v) - 1.118033988749895).abs() < 1e-12);
        assert_eq!(sample_std(&[5.0]), 0.0);
    }

    #[test]
    fn sample_performance_has_fixed_fields() {
        let report = sample_performance().unwrap();
        assert!(report.is_sample);
        assert_eq!(report.equity.len(), 380);
        assert_eq!(report.total_trades, 156);
        assert_eq!(report.win_rate, 0.58);
        assert!((report.sortino_ratio - report.sharpe_ratio * 1.1).abs() < 1e-12);
        assert!(report.max_drawdown <= 0.0);
    }

    #[test]
    fn sample_backtest_reuses_sample_equity() {
        let bt = sample_backtest().unwrap();
        assert_eq!(bt.total_trades, 89);
        assert_eq!(bt.equity_curve.len(), 380);
    }

    #[test]
    fn market_stats_need_two_bars_for_returns() {
        let one = MarketStats::from_bars(&[bar(1, 10.0)]).unwrap();
        assert_eq!(one.daily_return, None);
        assert_eq!(one.volatility, None);

        let two = MarketStats::from_bars(&[bar(1, 10.0), bar(2, 11.0)]).unwrap();
        assert!((two.daily_return.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(two.current_price, 11.0);
        assert!(MarketStats::from_bars(&[]).is_none());
    }

    #[tokio::test]
    async fn offline_performance_uses_sample_series() {
        let req = PerformanceRequest {
            symbols: vec!["AAPL".into(), "MSFT".into()],
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            strategy: Strategy::MeanReversion,
            initial_capital: 50_000.0,
            asset: AssetKind::Stock,
        };

        let report = calculate_real_performance(None, &req).await.unwrap();
        assert!(!report.is_sample);
        assert_eq!(report.total_trades, 379);
        assert!(report.notes.is_empty());

        let raw = returns_of(&equal_weight(&[sample_market_data().unwrap()]));
        assert!((report.returns[0].value - raw[0].value * -0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn empty_symbol_list_falls_back_to_sample() {
        let req = PerformanceRequest {
            symbols: vec![],
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            strategy: Strategy::Custom,
            initial_capital: 1.0,
            asset: AssetKind::Crypto,
        };

        let report = calculate_real_performance(None, &req).await.unwrap();
        assert!(report.is_sample);
        assert_eq!(report.notes, vec!["Unable to fetch any data".to_string()]);
    }
}
