use crate::performance::{TRADING_DAYS, mean, sample_std};

pub const DEFAULT_WINDOW: usize = 30;

/// Annualized Sharpe ratio over a trailing window of daily returns. Entries
/// before the first full window, or with zero dispersion, are `None`.
pub fn rolling_sharpe(returns: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; returns.len()];
    }

    (0..returns.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &returns[i + 1 - window..=i];
            let std = sample_std(slice);
            (std > 0.0).then(|| mean(slice) / std * TRADING_DAYS.sqrt())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_entries_are_none() {
        let r = vec![0.01, -0.02, 0.03, 0.0, 0.01];
        let s = rolling_sharpe(&r, 3);
        assert_eq!(s.len(), 5);
        assert!(s[0].is_none() && s[1].is_none());
        assert!(s[2].is_some());
    }

    #[test]
    fn window_value_matches_direct_computation() {
        let r = vec![0.01, -0.02, 0.03];
        let s = rolling_sharpe(&r, 3);
        let expected = mean(&r) / sample_std(&r) * 252f64.sqrt();
        assert!((s[2].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn constant_returns_have_no_sharpe() {
        assert!(rolling_sharpe(&[0.01; 5], 2).iter().all(Option::is_none));
        assert!(rolling_sharpe(&[0.01; 5], 0).iter().all(Option::is_none));
    }
}
