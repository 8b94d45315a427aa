use axum::{
    extract::{Query, State},
    response::Html,
};
use chrono::{Duration, NaiveDate, Utc};
use market::{
    AssetKind, chart,
    indicators::rolling::{DEFAULT_WINDOW, rolling_sharpe},
    performance::{
        PerformanceReport, PerformanceRequest, Strategy, calculate_real_performance,
        sample_performance,
    },
};
use serde::Deserialize;
use tracing::info;

use super::html::{Banner, Page, cards, input, metric_card, money, pct, select, table};
use super::{Tab, locale_for, non_empty};
use crate::AppState;
use crate::error::ApiResult;

const DEFAULT_CAPITAL: f64 = 100_000.0;
const HISTOGRAM_BINS: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct PerformanceQuery {
    pub lang: Option<String>,
    pub symbols: Option<String>,
    pub asset: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub strategy: Option<String>,
    pub capital: Option<String>,
    pub run: Option<String>,
}

/// Parsed form state; bad or missing fields fall back to defaults.
#[derive(Debug)]
struct Params {
    asset: AssetKind,
    symbols: Vec<String>,
    start: NaiveDate,
    end: NaiveDate,
    strategy: Strategy,
    capital: f64,
    run: bool,
}

impl Params {
    fn from_query(q: &PerformanceQuery, today: NaiveDate) -> Self {
        let asset = non_empty(&q.asset)
            .and_then(|a| a.parse().ok())
            .unwrap_or(AssetKind::Stock);
        let default_symbols = match asset {
            AssetKind::Stock => "AAPL,GOOGL,MSFT",
            AssetKind::Crypto => "bitcoin,ethereum",
        };
        let symbols = non_empty(&q.symbols)
            .unwrap_or(default_symbols)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match asset {
                AssetKind::Stock => s.to_uppercase(),
                AssetKind::Crypto => s.to_lowercase(),
            })
            .collect();
        let date = |v: &Option<String>| non_empty(v).and_then(|d| d.parse::<NaiveDate>().ok());

        Self {
            asset,
            symbols,
            start: date(&q.start).unwrap_or(today - Duration::days(365)),
            end: date(&q.end).unwrap_or(today),
            strategy: non_empty(&q.strategy)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            capital: non_empty(&q.capital)
                .and_then(|c| c.parse::<f64>().ok())
                .filter(|c| c.is_finite() && *c > 0.0)
                .unwrap_or(DEFAULT_CAPITAL),
            run: non_empty(&q.run).is_some(),
        }
    }
}

pub async fn page(
    State(state): State<AppState>,
    Query(q): Query<PerformanceQuery>,
) -> ApiResult<Html<String>> {
    let locale = locale_for(&state, q.lang.as_deref());
    let params = Params::from_query(&q, Utc::now().date_naive());
    let mut page = Page::new(locale, Tab::Performance);

    page.heading(page.t("performance_title"));
    page.push(controls(&page, locale, &params));

    let report = if !params.run {
        page.banner(Banner::Info, page.t("click_to_calculate"));
        sample_performance()?
    } else if params.symbols.is_empty() {
        page.banner(Banner::Warning, page.t("warning_select_asset"));
        sample_performance()?
    } else if params.start >= params.end {
        page.banner(Banner::Error, "Start date must be before end date");
        sample_performance()?
    } else {
        let req = PerformanceRequest {
            symbols: params.symbols.clone(),
            start: params.start,
            end: params.end,
            strategy: params.strategy,
            initial_capital: params.capital,
            asset: params.asset,
        };
        let report = calculate_real_performance(state.live_source(), &req).await?;
        info!(
            symbols = req.symbols.len(),
            strategy = %req.strategy,
            sample = report.is_sample,
            "performance calculated"
        );
        if report.is_sample {
            page.banner(Banner::Warning, "Using sample data");
        } else {
            page.banner(Banner::Success, page.t("analysis_completed"));
        }
        report
    };

    for note in &report.notes {
        page.banner(Banner::Warning, note);
    }

    page.subheading(page.t("current_parameters"));
    page.push(table(
        &[page.t("metric"), page.t("value")],
        &[
            vec![page.t("symbols").to_string(), params.symbols.join(", ")],
            vec![
                page.t("date_range").to_string(),
                format!("{} - {}", params.start, params.end),
            ],
            vec![
                page.t("strategy").to_string(),
                page.t(params.strategy.label_key()).to_string(),
            ],
            vec![page.t("initial_capital").to_string(), money(params.capital)],
        ],
    ));

    render_report(&mut page, &report)?;
    Ok(page.render())
}

fn render_report(page: &mut Page, r: &PerformanceReport) -> anyhow::Result<()> {
    page.push(cards(&[
        metric_card(page.t("total_return"), &pct(r.total_return), Some(r.total_return_delta)),
        metric_card(
            page.t("sharpe_ratio"),
            &format!("{:.2}", r.sharpe_ratio),
            Some(r.sharpe_delta),
        ),
        metric_card(page.t("max_drawdown"), &pct(r.max_drawdown), Some(r.drawdown_delta)),
        metric_card(page.t("win_rate"), &pct(r.win_rate), Some(r.win_rate_delta)),
    ]));

    page.subheading(page.t("equity_curve"));
    page.chart(&chart::equity_chart(&r.equity))?;

    page.subheading(page.t("drawdown_chart"));
    page.chart(&chart::drawdown_chart(&r.drawdown))?;

    page.subheading(page.t("returns_distribution"));
    page.chart(&chart::returns_histogram(&r.returns, HISTOGRAM_BINS))?;

    page.subheading(page.t("monthly_returns"));
    let values: Vec<f64> = r.returns.iter().map(|p| p.value).collect();
    let rolling = rolling_sharpe(&values, DEFAULT_WINDOW);
    page.chart(&chart::rolling_chart(
        &format!("Rolling Sharpe ({DEFAULT_WINDOW})"),
        &r.returns,
        &rolling,
    ))?;

    page.subheading(page.t("detailed_metrics"));
    let rows = vec![
        vec![page.t("total_return").to_string(), pct(r.total_return)],
        vec![page.t("annualized_return").to_string(), pct(r.annualized_return)],
        vec![page.t("volatility").to_string(), pct(r.volatility)],
        vec![page.t("sharpe_ratio").to_string(), format!("{:.2}", r.sharpe_ratio)],
        vec![page.t("sortino_ratio").to_string(), format!("{:.2}", r.sortino_ratio)],
        vec![page.t("max_drawdown").to_string(), pct(r.max_drawdown)],
        vec![page.t("calmar_ratio").to_string(), format!("{:.2}", r.calmar_ratio)],
        vec![page.t("win_rate").to_string(), pct(r.win_rate)],
        vec![page.t("profit_factor").to_string(), format!("{:.2}", r.profit_factor)],
        vec![page.t("total_trades").to_string(), r.total_trades.to_string()],
    ];
    page.push(table(&[page.t("metric"), page.t("value")], &rows));
    Ok(())
}

fn controls(page: &Page, locale: market::Locale, p: &Params) -> String {
    let assets = [
        ("stock", page.t("asset_stock")),
        ("crypto", page.t("asset_crypto")),
    ];
    let strategies: Vec<(&str, &str)> = Strategy::ALL
        .iter()
        .map(|s| (s.as_str(), page.t(s.label_key())))
        .collect();
    let placeholder = match p.asset {
        AssetKind::Stock => page.t("enter_stock_symbols"),
        AssetKind::Crypto => page.t("enter_crypto_ids"),
    };

    let fields = vec![
        select("asset", page.t("asset_type"), &assets, p.asset.as_str()),
        input("symbols", placeholder, "text", &p.symbols.join(",")),
        input("start", page.t("start_date"), "date", &p.start.to_string()),
        input("end", page.t("end_date"), "date", &p.end.to_string()),
        select("strategy", page.t("select_strategy"), &strategies, p.strategy.as_str()),
        input("capital", page.t("initial_capital"), "number", &format!("{:.0}", p.capital)),
    ];

    super::html::form(Tab::Performance.path(), locale, &fields, page.t("run_analysis"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn empty_query_uses_defaults() {
        let p = Params::from_query(&PerformanceQuery::default(), today());
        assert_eq!(p.asset, AssetKind::Stock);
        assert_eq!(p.symbols, vec!["AAPL", "GOOGL", "MSFT"]);
        assert_eq!(p.end, today());
        assert_eq!((p.end - p.start).num_days(), 365);
        assert_eq!(p.strategy, Strategy::Momentum);
        assert_eq!(p.capital, DEFAULT_CAPITAL);
        assert!(!p.run);
    }

    #[test]
    fn parses_filled_form() {
        let q = PerformanceQuery {
            asset: Some("crypto".into()),
            symbols: Some(" Bitcoin, ,solana ".into()),
            start: Some("2024-01-01".into()),
            end: Some("2024-03-01".into()),
            strategy: Some("mean_reversion".into()),
            capital: Some("5000".into()),
            run: Some("1".into()),
            ..Default::default()
        };
        let p = Params::from_query(&q, today());
        assert_eq!(p.symbols, vec!["bitcoin", "solana"]);
        assert_eq!(p.start.to_string(), "2024-01-01");
        assert_eq!(p.strategy, Strategy::MeanReversion);
        assert_eq!(p.capital, 5000.0);
        assert!(p.run);
    }

    #[test]
    fn bad_fields_fall_back() {
        let q = PerformanceQuery {
            start: Some("yesterday".into()),
            capital: Some("-10".into()),
            strategy: Some("yolo".into()),
            ..Default::default()
        };
        let p = Params::from_query(&q, today());
        assert_eq!(p.capital, DEFAULT_CAPITAL);
        assert_eq!(p.strategy, Strategy::Momentum);
        assert_eq!(p.start, today() - Duration::days(365));
    }
}
