use anyhow::{Error, anyhow};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

pub const DEFAULT_PERIOD: usize = 14;
pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;

/// RSI over simple moving averages of gains and losses.
///
/// The output is aligned with `closes`. The first bar counts as a zero change,
/// so the first value appears at index `period - 1`.
pub fn calculate(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, Error> {
    let mut gains = SimpleMovingAverage::new(period)
        .map_err(|e| anyhow!("invalid RSI period {period}: {e:?}"))?;
    let mut losses = SimpleMovingAverage::new(period)
        .map_err(|e| anyhow!("invalid RSI period {period}: {e:?}"))?;

    let mut out = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;

    for (i, &close) in closes.iter().enumerate() {
        let delta = prev.map_or(0.0, |p| close - p);
        prev = Some(close);

        let avg_gain = gains.next(delta.max(0.0));
        let avg_loss = losses.next((-delta).max(0.0));

        if i + 1 < period {
            out.push(None);
            continue;
        }

        let rsi = if avg_loss == 0.0 {
            if avg_gain == 0.0 { None } else { Some(100.0) }
        } else {
            Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
        };
        out.push(rsi);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_lands_on_period_minus_one() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let rsi = calculate(&closes, 14).unwrap();
        assert_eq!(rsi.len(), closes.len());
        assert!(rsi[..13].iter().all(Option::is_none));
        assert!(rsi[13].is_some());
    }

    #[test]
    fn first_window_counts_opening_bar_as_flat() {
        // 12 rises of 1 and a single drop of 2 after the opening bar
        let mut closes: Vec<f64> = (0..13).map(|i| i as f64).collect();
        closes.push(10.0);
        let rsi = calculate(&closes, 14).unwrap();
        let expected = 100.0 - 100.0 / (1.0 + (12.0 / 14.0) / (2.0 / 14.0));
        assert!((rsi[13].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn monotonic_rise_is_fully_overbought() {
        let closes: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let rsi = calculate(&closes, 14).unwrap();
        assert_eq!(rsi[29], Some(100.0));
    }

    #[test]
    fn balanced_moves_sit_at_fifty() {
        let closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let rsi = calculate(&closes, 14).unwrap();
        let last = rsi[29].unwrap();
        assert!((last - 50.0).abs() < 1e-9);
    }

    #[test]
    fn flat_series_has_no_rsi() {
        let rsi = calculate(&[5.0; 20], 14).unwrap();
        assert!(rsi.iter().all(Option::is_none));
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(calculate(&[1.0, 2.0], 0).is_err());
    }
}
