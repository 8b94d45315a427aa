use std::str::FromStr;

use anyhow::{Error, bail};
use axum::{
    extract::{Query, State},
    response::Html,
};
use market::{
    chart,
    performance::{Strategy, sample_backtest},
};
use serde::Deserialize;

use super::html::{Banner, Page, cards, input, metric_card, pct, select, table};
use super::{Tab, locale_for, non_empty};
use crate::AppState;
use crate::error::ApiResult;

const LOOKBACK_DAYS: (u32, u32) = (5, 252);
const MAX_COST_PERCENT: f64 = 1.0;

#[derive(Debug, Default, Deserialize)]
pub struct BacktestQuery {
    pub lang: Option<String>,
    pub strategy: Option<String>,
    pub lookback: Option<String>,
    pub rebalance: Option<String>,
    pub commission: Option<String>,
    pub slippage: Option<String>,
    pub position_size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Rebalance {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Rebalance {
    const ALL: [Rebalance; 4] = [
        Rebalance::Daily,
        Rebalance::Weekly,
        Rebalance::Monthly,
        Rebalance::Quarterly,
    ];

    /// Form value, which doubles as the translation key.
    fn as_str(&self) -> &'static str {
        match self {
            Rebalance::Daily => "daily",
            Rebalance::Weekly => "weekly",
            Rebalance::Monthly => "monthly",
            Rebalance::Quarterly => "quarterly",
        }
    }
}

impl FromStr for Rebalance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Rebalance::Daily),
            "weekly" => Ok(Rebalance::Weekly),
            "monthly" => Ok(Rebalance::Monthly),
            "quarterly" => Ok(Rebalance::Quarterly),
            _ => bail!("unknown rebalance frequency: {s}"),
        }
    }
}

/// Chosen settings. Results come from the bundled sample run, so these are
/// only echoed back; out-of-range numbers are clamped, unparsable ones reset.
#[derive(Debug, PartialEq)]
struct Params {
    strategy: Strategy,
    lookback: u32,
    rebalance: Rebalance,
    commission: f64,
    slippage: f64,
    position_size: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            lookback: 20,
            rebalance: Rebalance::default(),
            commission: 0.1,
            slippage: 0.05,
            position_size: 10,
        }
    }
}

impl Params {
    fn from_query(q: &BacktestQuery) -> Self {
        let defaults = Self::default();
        let percent = |v: &Option<String>, fallback: f64| {
            non_empty(v)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|p| p.is_finite())
                .map(|p| p.clamp(0.0, MAX_COST_PERCENT))
                .unwrap_or(fallback)
        };

        Self {
            strategy: non_empty(&q.strategy)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.strategy),
            lookback: non_empty(&q.lookback)
                .and_then(|s| s.parse::<u32>().ok())
                .map(|d| d.clamp(LOOKBACK_DAYS.0, LOOKBACK_DAYS.1))
                .unwrap_or(defaults.lookback),
            rebalance: non_empty(&q.rebalance)
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rebalance),
            commission: percent(&q.commission, defaults.commission),
            slippage: percent(&q.slippage, defaults.slippage),
            position_size: non_empty(&q.position_size)
                .and_then(|s| s.parse::<u32>().ok())
                .map(|p| p.clamp(1, 100))
                .unwrap_or(defaults.position_size),
        }
    }
}

pub async fn page(
    State(state): State<AppState>,
    Query(q): Query<BacktestQuery>,
) -> ApiResult<Html<String>> {
    let locale = locale_for(&state, q.lang.as_deref());
    let mut page = Page::new(locale, Tab::Backtest);
    let params = Params::from_query(&q);
    let summary = sample_backtest()?;

    page.heading(page.t("backtest_title"));
    page.push(controls(&page, locale, &params));

    page.subheading(page.t("strategy_parameters"));
    page.push(table(
        &[page.t("metric"), page.t("value")],
        &[
            vec![
                page.t("strategy").to_string(),
                page.t(params.strategy.label_key()).to_string(),
            ],
            vec![page.t("lookback_period").to_string(), params.lookback.to_string()],
            vec![
                page.t("rebalance_frequency").to_string(),
                page.t(params.rebalance.as_str()).to_string(),
            ],
            vec![page.t("commission").to_string(), format!("{:.2}", params.commission)],
            vec![page.t("slippage").to_string(), format!("{:.2}", params.slippage)],
            vec!["Position Size (%)".to_string(), params.position_size.to_string()],
        ],
    ));

    page.banner(Banner::Success, page.t("backtest_completed"));
    page.subheading(page.t("backtest_results"));
    page.push(cards(&[
        metric_card(page.t("total_return"), &pct(summary.total_return), None),
        metric_card(page.t("sharpe_ratio"), &format!("{:.2}", summary.sharpe_ratio), None),
        metric_card(page.t("max_drawdown"), &pct(summary.max_drawdown), None),
        metric_card(page.t("win_rate"), &pct(summary.win_rate), None),
        metric_card(page.t("total_trades"), &summary.total_trades.to_string(), None),
    ]));

    page.subheading(page.t("equity_curve"));
    page.chart(&chart::equity_chart(&summary.equity_curve))?;

    Ok(page.render())
}

fn controls(page: &Page, locale: market::Locale, p: &Params) -> String {
    let strategies: Vec<(&str, &str)> = Strategy::ALL
        .iter()
        .map(|s| (s.as_str(), page.t(s.label_key())))
        .collect();
    let frequencies: Vec<(&str, &str)> = Rebalance::ALL
        .iter()
        .map(|r| (r.as_str(), page.t(r.as_str())))
        .collect();

    let fields = vec![
        select("strategy", page.t("select_strategy"), &strategies, p.strategy.as_str()),
        input("lookback", page.t("lookback_period"), "number", &p.lookback.to_string()),
        select(
            "rebalance",
            page.t("rebalance_frequency"),
            &frequencies,
            p.rebalance.as_str(),
        ),
        input("commission", page.t("commission"), "number", &p.commission.to_string()),
        input("slippage", page.t("slippage"), "number", &p.slippage.to_string()),
        input(
            "position_size",
            "Position Size (%)",
            "number",
            &p.position_size.to_string(),
        ),
    ];

    super::html::form(Tab::Backtest.path(), locale, &fields, page.t("run_backtest"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_uses_defaults() {
        assert_eq!(Params::from_query(&BacktestQuery::default()), Params::default());
    }

    #[test]
    fn parses_and_clamps_settings() {
        let q = BacktestQuery {
            strategy: Some("mean_reversion".into()),
            lookback: Some("1000".into()),
            rebalance: Some("Quarterly".into()),
            commission: Some("0.25".into()),
            slippage: Some("7".into()),
            position_size: Some("0".into()),
            ..Default::default()
        };
        let p = Params::from_query(&q);
        assert_eq!(p.strategy, Strategy::MeanReversion);
        assert_eq!(p.lookback, 252);
        assert_eq!(p.rebalance, Rebalance::Quarterly);
        assert_eq!(p.commission, 0.25);
        assert_eq!(p.slippage, MAX_COST_PERCENT);
        assert_eq!(p.position_size, 1);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let q = BacktestQuery {
            strategy: Some("astrology".into()),
            lookback: Some("-3".into()),
            rebalance: Some("hourly".into()),
            commission: Some("NaN".into()),
            ..Default::default()
        };
        assert_eq!(Params::from_query(&q), Params::default());
    }
}
