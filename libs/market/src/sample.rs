//! Seeded sample data, shown when live data is disabled or nothing has been
//! calculated yet. Every generator reseeds, so repeated calls return the same
//! series.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, LogNormal, Normal};

use crate::models::Bar;

pub const SAMPLE_SEED: u64 = 42;

const START: (i32, u32, u32) = (2023, 1, 1);
const END: (i32, u32, u32) = (2024, 1, 15);

/// Daily timestamps from 2023-01-01 through 2024-01-15, inclusive.
pub fn sample_dates() -> Vec<DateTime<Utc>> {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(START.0, START.1, START.2),
        NaiveDate::from_ymd_opt(END.0, END.1, END.2),
    ) else {
        return Vec::new();
    };

    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter_map(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .collect()
}

pub fn sample_rng() -> StdRng {
    StdRng::seed_from_u64(SAMPLE_SEED)
}

/// Daily returns drawn from N(0.0005, 0.02).
pub fn sample_returns(rng: &mut StdRng, n: usize) -> Result<Vec<f64>> {
    let dist = Normal::new(0.0005, 0.02)?;
    Ok((0..n).map(|_| dist.sample(&mut *rng)).collect())
}

/// Compounds `returns` from `start`: `start * prod(1 + r)` at each step.
pub fn compound(start: f64, returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(start, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// A year of synthetic daily OHLCV bars starting at a price of 100.
pub fn sample_market_data() -> Result<Vec<Bar>> {
    let dates = sample_dates();
    let n = dates.len();
    let mut rng = sample_rng();

    let closes = compound(100.0, &sample_returns(&mut rng, n)?);

    let volume = LogNormal::new(10.0, 0.5)?;
    let volumes: Vec<f64> = (0..n).map(|_| volume.sample(&mut rng)).collect();

    let open_noise = Normal::new(0.0, 0.005)?;
    let range_noise: Normal<f64> = Normal::new(0.0, 0.01)?;
    let opens: Vec<f64> = (0..n).map(|_| open_noise.sample(&mut rng)).collect();
    let highs: Vec<f64> = (0..n).map(|_| range_noise.sample(&mut rng).abs()).collect();
    let lows: Vec<f64> = (0..n).map(|_| range_noise.sample(&mut rng).abs()).collect();

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| {
            let close = closes[i];
            Bar {
                timestamp,
                open: close * (1.0 + opens[i]),
                high: close * (1.0 + highs[i]),
                low: close * (1.0 - lows[i]),
                close,
                volume: volumes[i],
                market_cap: None,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_calendar_is_inclusive() {
        let dates = sample_dates();
        assert_eq!(dates.len(), 380);
        assert_eq!(dates[0].date_naive().to_string(), "2023-01-01");
        assert_eq!(dates[379].date_naive().to_string(), "2024-01-15");
    }

    #[test]
    fn sample_market_data_is_deterministic() {
        let a = sample_market_data().unwrap();
        let b = sample_market_data().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 380);
    }

    #[test]
    fn sample_bars_are_well_formed() {
        for bar in sample_market_data().unwrap() {
            assert!(bar.high >= bar.close);
            assert!(bar.low <= bar.close);
            assert!(bar.volume > 0.0);
            assert!(bar.close > 0.0);
        }
    }

    #[test]
    fn compound_starts_from_first_return() {
        let equity = compound(100.0, &[0.1, -0.5]);
        assert!((equity[0] - 110.0).abs() < 1e-9);
        assert!((equity[1] - 55.0).abs() < 1e-9);
    }
}
