use axum::{
    extract::{Query, State},
    response::Html,
};
use market::{
    AssetKind, Bar, MAX_CRYPTO_DAYS, MarketData, Period, chart,
    indicators::rsi,
    performance::MarketStats,
    sample::sample_market_data,
};
use serde::Deserialize;
use tracing::warn;

use super::html::{Banner, Page, cards, input, metric_card, money, select, table, thousands};
use super::{Tab, locale_for, non_empty};
use crate::AppState;
use crate::error::ApiResult;

const STOCKS: [&str; 8] = ["AAPL", "GOOGL", "MSFT", "TSLA", "AMZN", "NVDA", "META", "NFLX"];
const STOCK_PERIODS: [Period; 6] = [
    Period::Day1,
    Period::Day5,
    Period::Month1,
    Period::Month3,
    Period::Month6,
    Period::Year1,
];

const CRYPTOS: [(&str, &str); 8] = [
    ("bitcoin", "Bitcoin (BTC)"),
    ("ethereum", "Ethereum (ETH)"),
    ("binancecoin", "BNB (BNB)"),
    ("solana", "Solana (SOL)"),
    ("cardano", "Cardano (ADA)"),
    ("ripple", "XRP (XRP)"),
    ("polkadot", "Polkadot (DOT)"),
    ("dogecoin", "Dogecoin (DOGE)"),
];
const CRYPTO_DAYS: [u32; 5] = [7, 30, 90, 180, 365];

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    pub lang: Option<String>,
    pub asset: Option<String>,
    pub symbol: Option<String>,
    pub coin: Option<String>,
    pub period: Option<String>,
    pub days: Option<String>,
}

pub async fn page(
    State(state): State<AppState>,
    Query(q): Query<MarketQuery>,
) -> ApiResult<Html<String>> {
    let locale = locale_for(&state, q.lang.as_deref());
    let mut page = Page::new(locale, Tab::Market);

    let asset = non_empty(&q.asset)
        .and_then(|a| a.parse().ok())
        .unwrap_or(AssetKind::Stock);
    let symbol = non_empty(&q.symbol).unwrap_or("AAPL").to_uppercase();
    let coin = non_empty(&q.coin).unwrap_or("bitcoin").to_lowercase();
    let period_raw = non_empty(&q.period).unwrap_or("1mo");
    let days_raw = non_empty(&q.days).unwrap_or("30");

    page.heading(page.t("market_title"));
    page.push(controls(&page, locale, asset, &symbol, &coin, period_raw, days_raw));

    let (label, fetched) = match state.live_source() {
        None => {
            page.banner(Banner::Info, "Live data is disabled, showing sample market data");
            ("SAMPLE".to_string(), sample_market_data())
        }
        Some(source) => match load(source, asset, &symbol, &coin, period_raw, days_raw).await {
            Ok((label, bars, note)) => {
                if let Some(note) = note {
                    page.banner(Banner::Warning, &note);
                }
                (label, Ok(bars))
            }
            Err(e) => {
                page.banner(Banner::Error, &format!("{}: {e}", page.t("error")));
                return Ok(page.render());
            }
        },
    };

    let bars = match fetched {
        Ok(bars) if !bars.is_empty() => bars,
        Ok(_) => {
            page.banner(Banner::Error, &format!("{}: {label}", page.t("error")));
            return Ok(page.render());
        }
        Err(e) => {
            warn!(error = ?e, %label, "market data unavailable");
            page.banner(Banner::Error, &format!("{}: {label}", page.t("error")));
            return Ok(page.render());
        }
    };

    page.paragraph(&format!(
        "{} {label}: {}",
        page.t("showing_data_points"),
        bars.len()
    ));

    page.subheading(page.t("price_chart"));
    page.chart(&chart::price_chart(&label, &bars))?;

    page.subheading(page.t("technical_indicators"));
    if bars.len() >= rsi::DEFAULT_PERIOD {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let values = rsi::calculate(&closes, rsi::DEFAULT_PERIOD)?;
        page.chart(&chart::rsi_chart(&bars, &values))?;
    } else {
        page.banner(
            Banner::Info,
            &format!(
                "Not enough data for RSI ({}): {} of {} points",
                rsi::DEFAULT_PERIOD,
                bars.len(),
                rsi::DEFAULT_PERIOD
            ),
        );
    }

    page.subheading(page.t("volume_analysis"));
    page.chart(&chart::volume_chart(&bars))?;

    if let Some(stats) = MarketStats::from_bars(&bars) {
        page.subheading(page.t("market_statistics"));
        page.push(cards(&[
            metric_card(page.t("current_price"), &money(stats.current_price), None),
            metric_card(
                page.t("daily_return"),
                &stats
                    .daily_return
                    .map(|r| format!("{r:.2}%"))
                    .unwrap_or_else(|| "-".to_string()),
                None,
            ),
            metric_card(
                page.t("volatility"),
                &stats
                    .volatility
                    .map(|v| format!("{v:.2}%"))
                    .unwrap_or_else(|| "-".to_string()),
                None,
            ),
            metric_card(page.t("avg_volume"), &thousands(stats.avg_volume, 0), None),
        ]));
    }

    if let Some(source) = state.live_source() {
        let details = match asset {
            AssetKind::Stock => stock_details(source, &symbol).await,
            AssetKind::Crypto => crypto_details(source, &coin).await,
        };
        if let Some(rows) = details {
            page.push(table(&[page.t("metric"), page.t("value")], &rows));
        }
    }

    Ok(page.render())
}

/// Bars for the selected asset plus an optional note for the user.
async fn load(
    source: &dyn MarketData,
    asset: AssetKind,
    symbol: &str,
    coin: &str,
    period: &str,
    days: &str,
) -> anyhow::Result<(String, Vec<Bar>, Option<String>)> {
    match asset {
        AssetKind::Stock => {
            let period: Period = period.parse()?;
            let bars = source.get_stock_data(symbol, period).await?;
            Ok((symbol.to_string(), bars, None))
        }
        AssetKind::Crypto => {
            let requested: u32 = days.parse()?;
            let days = requested.clamp(1, MAX_CRYPTO_DAYS);
            let note = (requested > MAX_CRYPTO_DAYS)
                .then(|| format!("CoinGecko serves at most {MAX_CRYPTO_DAYS} days"));
            let bars = source.get_crypto_history(coin, days).await?;
            Ok((coin.to_string(), bars, note))
        }
    }
}

async fn stock_details(source: &dyn MarketData, symbol: &str) -> Option<Vec<Vec<String>>> {
    let info = source
        .get_stock_info(symbol)
        .await
        .inspect_err(|e| warn!(%symbol, error = ?e, "stock info unavailable"))
        .ok()??;

    Some(vec![
        vec!["Name".into(), info.name],
        vec!["Price".into(), money(info.price)],
        vec!["Change".into(), format!("{:.2}%", info.change)],
        vec!["Volume".into(), thousands(info.volume, 0)],
        vec!["Market Cap".into(), or_na(info.market_cap, money)],
        vec!["P/E".into(), or_na(info.pe_ratio, |v| format!("{v:.2}"))],
        vec!["Dividend Yield".into(), or_na(info.dividend_yield, |v| format!("{:.2}%", v * 100.0))],
        vec!["52W High".into(), money(info.fifty_two_week_high)],
        vec!["52W Low".into(), money(info.fifty_two_week_low)],
    ])
}

fn or_na(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value.map(fmt).unwrap_or_else(|| "N/A".to_string())
}

async fn crypto_details(source: &dyn MarketData, coin: &str) -> Option<Vec<Vec<String>>> {
    let price = source
        .get_crypto_price(coin)
        .await
        .inspect_err(|e| warn!(%coin, error = ?e, "crypto price unavailable"))
        .ok()??;

    Some(vec![
        vec!["Price".into(), money(price.price)],
        vec!["24h Change".into(), format!("{:.2}%", price.change_24h)],
        vec!["Market Cap".into(), money(price.market_cap)],
        vec!["24h Volume".into(), money(price.volume_24h)],
    ])
}

fn controls(
    page: &Page,
    locale: market::Locale,
    asset: AssetKind,
    symbol: &str,
    coin: &str,
    period: &str,
    days: &str,
) -> String {
    let assets = [
        ("stock", page.t("asset_stock")),
        ("crypto", page.t("asset_crypto")),
    ];
    let mut fields = vec![select("asset", page.t("asset_type"), &assets, asset.as_str())];

    match asset {
        AssetKind::Stock => {
            let stocks: Vec<(&str, &str)> = STOCKS.iter().map(|s| (*s, *s)).collect();
            let periods: Vec<(&str, &str)> =
                STOCK_PERIODS.iter().map(|p| (p.as_str(), p.as_str())).collect();
            if STOCKS.contains(&symbol) {
                fields.push(select("symbol", page.t("select_symbol"), &stocks, symbol));
            } else {
                fields.push(input("symbol", page.t("select_symbol"), "text", symbol));
            }
            fields.push(select("period", page.t("time_period"), &periods, period));
        }
        AssetKind::Crypto => {
            let day_labels: Vec<String> = CRYPTO_DAYS
                .iter()
                .map(|d| format!("{d} {}", page.t("days")))
                .collect();
            let day_values: Vec<String> = CRYPTO_DAYS.iter().map(u32::to_string).collect();
            let days_opts: Vec<(&str, &str)> = day_values
                .iter()
                .zip(&day_labels)
                .map(|(v, l)| (v.as_str(), l.as_str()))
                .collect();
            if CRYPTOS.iter().any(|(id, _)| *id == coin) {
                fields.push(select("coin", page.t("select_symbol"), &CRYPTOS, coin));
            } else {
                fields.push(input("coin", page.t("select_symbol"), "text", coin));
            }
            fields.push(select("days", page.t("time_period"), &days_opts, days));
        }
    }

    super::html::form(Tab::Market.path(), locale, &fields, page.t("run_analysis"))
}
