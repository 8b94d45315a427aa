use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::coingecko_client::{CoinGeckoClient, MarketChart, SimplePrice};
use crate::models::{
    AssetKind, Bar, CryptoPrice, CryptoQuote, Period, StockInfo, StockQuote, TrendingCoin,
};
use crate::yahoo_client::{ChartMeta, YahooClient};

/// CoinGecko's public API serves at most a year of daily history.
pub const MAX_CRYPTO_DAYS: u32 = 365;

/// The fetch surface shared by the HTTP API and the dashboard.
///
/// `Ok(None)` / an empty `Vec` means the provider answered but had nothing for
/// the request; `Err` means the provider could not be reached or answered with
/// something unusable.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn get_stock_data(&self, symbol: &str, period: Period) -> Result<Vec<Bar>>;

    async fn get_stock_info(&self, symbol: &str) -> Result<Option<StockInfo>>;

    async fn get_stock_quote(&self, symbol: &str) -> Result<Option<StockQuote>>;

    async fn get_crypto_price(&self, coin_id: &str) -> Result<Option<CryptoPrice>>;

    async fn get_crypto_history(&self, coin_id: &str, days: u32) -> Result<Vec<Bar>>;

    async fn get_multiple_cryptos(
        &self,
        coin_ids: &[String],
    ) -> Result<BTreeMap<String, CryptoQuote>>;

    async fn get_trending_cryptos(&self, limit: usize) -> Result<Vec<TrendingCoin>>;

    /// Bars per symbol; symbols that fail or come back empty are left out.
    async fn get_multiple_stocks(
        &self,
        symbols: &[String],
        period: Period,
    ) -> BTreeMap<String, Vec<Bar>> {
        let mut result = BTreeMap::new();
        for symbol in symbols {
            match self.get_stock_data(symbol, period).await {
                Ok(bars) if !bars.is_empty() => {
                    result.insert(symbol.clone(), bars);
                }
                Ok(_) => {}
                Err(e) => warn!(%symbol, error = ?e, "skipping symbol"),
            }
        }
        result
    }

    async fn get_current_price(&self, symbol: &str, kind: AssetKind) -> Result<f64> {
        let price = match kind {
            AssetKind::Stock => self.get_stock_quote(symbol).await?.map(|q| q.price),
            AssetKind::Crypto => self.get_crypto_price(symbol).await?.map(|p| p.price),
        };
        price.ok_or_else(|| anyhow!("no {kind} price for {symbol}"))
    }
}

/// Live market data from Yahoo Finance (stocks) and CoinGecko (crypto).
#[derive(Clone)]
pub struct LiveDataFetcher {
    yahoo: YahooClient,
    coingecko: CoinGeckoClient,
}

impl LiveDataFetcher {
    pub fn new(yahoo: YahooClient, coingecko: CoinGeckoClient) -> Self {
        info!("live data fetcher initialized");
        Self { yahoo, coingecko }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(YahooClient::from_env()?, CoinGeckoClient::from_env()?))
    }

    pub fn yahoo_base(&self) -> &str {
        self.yahoo.base_api()
    }

    pub fn coingecko_base(&self) -> &str {
        self.coingecko.base_api()
    }
}

#[async_trait]
impl MarketData for LiveDataFetcher {
    async fn get_stock_data(&self, symbol: &str, period: Period) -> Result<Vec<Bar>> {
        let chart = self.yahoo.fetch_chart(symbol, period).await.inspect_err(|e| {
            error!(%symbol, error = ?e, "fetching stock data failed");
        })?;

        let bars = chart.map(|c| c.bars()).unwrap_or_default();
        if bars.is_empty() {
            warn!(%symbol, %period, "no stock data found");
        } else {
            info!(%symbol, rows = bars.len(), "fetched stock data");
        }
        Ok(bars)
    }

    async fn get_stock_info(&self, symbol: &str) -> Result<Option<StockInfo>> {
        let chart = self
            .yahoo
            .fetch_chart(symbol, Period::Day1)
            .await
            .inspect_err(|e| error!(%symbol, error = ?e, "fetching stock info failed"))?;

        Ok(chart.map(|c| stock_info(symbol, &c.meta)))
    }

    async fn get_stock_quote(&self, symbol: &str) -> Result<Option<StockQuote>> {
        let chart = self
            .yahoo
            .fetch_chart(symbol, Period::Day1)
            .await
            .inspect_err(|e| error!(%symbol, error = ?e, "fetching stock quote failed"))?;

        Ok(chart.and_then(|c| stock_quote(symbol, &c.meta)))
    }

    async fn get_crypto_price(&self, coin_id: &str) -> Result<Option<CryptoPrice>> {
        let ids = [coin_id.to_string()];
        let prices = self
            .coingecko
            .simple_price(&ids, true)
            .await
            .inspect_err(|e| error!(%coin_id, error = ?e, "fetching crypto price failed"))?;

        let price = prices.get(coin_id).and_then(|p| crypto_price(coin_id, p));
        if price.is_none() {
            warn!(%coin_id, "no crypto price found");
        }
        Ok(price)
    }

    async fn get_crypto_history(&self, coin_id: &str, days: u32) -> Result<Vec<Bar>> {
        let days = days.clamp(1, MAX_CRYPTO_DAYS);
        info!(%coin_id, days, "fetching crypto history");

        let chart = self
            .coingecko
            .market_chart(coin_id, days)
            .await
            .inspect_err(|e| error!(%coin_id, error = ?e, "fetching crypto history failed"))?;

        let bars = bars_from_market_chart(&chart);
        if bars.is_empty() {
            warn!(%coin_id, "no crypto history found");
        } else {
            info!(%coin_id, rows = bars.len(), "fetched crypto history");
        }
        Ok(bars)
    }

    async fn get_multiple_cryptos(
        &self,
        coin_ids: &[String],
    ) -> Result<BTreeMap<String, CryptoQuote>> {
        if coin_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let prices = self
            .coingecko
            .simple_price(coin_ids, false)
            .await
            .inspect_err(|e| error!(error = ?e, "fetching multiple cryptos failed"))?;

        Ok(coin_ids
            .iter()
            .filter_map(|id| {
                let p = prices.get(id)?;
                Some((
                    id.clone(),
                    CryptoQuote {
                        price: p.usd?,
                        change_24h: p.usd_24h_change.unwrap_or(0.0),
                        market_cap: p.usd_market_cap.unwrap_or(0.0),
                    },
                ))
            })
            .collect())
    }

    async fn get_trending_cryptos(&self, limit: usize) -> Result<Vec<TrendingCoin>> {
        let trending = self
            .coingecko
            .trending()
            .await
            .inspect_err(|e| error!(error = ?e, "fetching trending cryptos failed"))?;

        Ok(trending
            .coins
            .into_iter()
            .take(limit)
            .map(|c| TrendingCoin {
                id: c.item.id,
                name: c.item.name,
                symbol: c.item.symbol,
                market_cap_rank: c.item.market_cap_rank.unwrap_or(0),
            })
            .collect())
    }
}

fn stock_info(symbol: &str, meta: &ChartMeta) -> StockInfo {
    let price = meta.regular_market_price.unwrap_or(0.0);

    StockInfo {
        symbol: symbol.to_string(),
        name: meta
            .long_name
            .clone()
            .or_else(|| meta.short_name.clone())
            .unwrap_or_else(|| symbol.to_string()),
        price,
        change: percent_change(price, previous_close(meta)),
        volume: meta.regular_market_volume.unwrap_or(0.0),
        market_cap: meta.market_cap,
        pe_ratio: meta.trailing_pe,
        dividend_yield: meta.dividend_yield,
        fifty_two_week_high: meta.fifty_two_week_high.unwrap_or(0.0),
        fifty_two_week_low: meta.fifty_two_week_low.unwrap_or(0.0),
    }
}

fn stock_quote(symbol: &str, meta: &ChartMeta) -> Option<StockQuote> {
    let price = meta.regular_market_price?;
    let previous_close = previous_close(meta).unwrap_or(price);

    let timestamp = meta
        .regular_market_time
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .unwrap_or_else(Utc::now);

    Some(StockQuote {
        symbol: symbol.to_string(),
        price,
        previous_close,
        change: price - previous_close,
        change_percent: percent_change(price, Some(previous_close)),
        volume: meta.regular_market_volume.unwrap_or(0.0),
        timestamp,
    })
}

fn previous_close(meta: &ChartMeta) -> Option<f64> {
    meta.previous_close.or(meta.chart_previous_close)
}

fn percent_change(price: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(prev) if prev != 0.0 => (price / prev - 1.0) * 100.0,
        _ => 0.0,
    }
}

fn crypto_price(coin_id: &str, p: &SimplePrice) -> Option<CryptoPrice> {
    Some(CryptoPrice {
        coin_id: coin_id.to_string(),
        price: p.usd?,
        change_24h: p.usd_24h_change.unwrap_or(0.0),
        market_cap: p.usd_market_cap.unwrap_or(0.0),
        volume_24h: p.usd_24h_vol.unwrap_or(0.0),
    })
}

/// Reshape a price-only CoinGecko series into OHLCV bars. Volume and market cap
/// are joined on the exact timestamp; points without a match get 0 / `None`.
pub fn bars_from_market_chart(chart: &MarketChart) -> Vec<Bar> {
    let volumes: HashMap<i64, f64> = chart
        .total_volumes
        .iter()
        .map(|&(ts, v)| (ts as i64, v))
        .collect();
    let caps: HashMap<i64, f64> = chart
        .market_caps
        .iter()
        .map(|&(ts, v)| (ts as i64, v))
        .collect();

    chart
        .prices
        .iter()
        .filter_map(|&(ts, price)| {
            let ms = ts as i64;
            let timestamp = DateTime::<Utc>::from_timestamp_millis(ms)?;
            Some(Bar {
                volume: volumes.get(&ms).copied().unwrap_or(0.0),
                market_cap: caps.get(&ms).copied(),
                ..Bar::from_price(timestamp, price)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_bars_are_flat_ohlc() {
        let chart = MarketChart {
            prices: vec![(1_704_067_200_000.0, 42_280.2), (1_704_153_600_000.0, 44_187.1)],
            market_caps: vec![(1_704_067_200_000.0, 8.2e11)],
            total_volumes: vec![
                (1_704_067_200_000.0, 1.1e10),
                (1_704_153_600_000.0, 2.3e10),
            ],
        };

        let bars = bars_from_market_chart(&chart);
        assert_eq!(bars.len(), 2);

        let b = &bars[1];
        assert_eq!(b.open, 44_187.1);
        assert_eq!(b.high, b.close);
        assert_eq!(b.low, b.close);
        assert_eq!(b.volume, 2.3e10);
        assert_eq!(b.market_cap, None);
        assert_eq!(bars[0].market_cap, Some(8.2e11));
        assert_eq!(bars[0].date(), "2024-01-01");
    }

    #[test]
    fn crypto_bars_without_volumes_default_to_zero() {
        let chart = MarketChart {
            prices: vec![(1_704_067_200_000.0, 1.0)],
            ..Default::default()
        };
        let bars = bars_from_market_chart(&chart);
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn stock_info_leaves_unreported_fundamentals_empty() {
        let meta = ChartMeta {
            symbol: "XYZ".into(),
            regular_market_price: Some(110.0),
            chart_previous_close: Some(100.0),
            ..Default::default()
        };

        let info = stock_info("XYZ", &meta);
        assert_eq!(info.name, "XYZ");
        assert_eq!(info.price, 110.0);
        assert!((info.change - 10.0).abs() < 1e-9);
        assert_eq!(info.market_cap, None);
        assert_eq!(info.pe_ratio, None);
        assert_eq!(info.dividend_yield, None);
        assert_eq!(info.fifty_two_week_high, 0.0);
    }

    #[test]
    fn stock_quote_prefers_previous_close_over_chart_close() {
        let meta = ChartMeta {
            symbol: "SPY".into(),
            regular_market_price: Some(99.0),
            previous_close: Some(100.0),
            chart_previous_close: Some(90.0),
            regular_market_time: Some(1_704_205_800),
            ..Default::default()
        };

        let quote = stock_quote("SPY", &meta).unwrap();
        assert_eq!(quote.previous_close, 100.0);
        assert!((quote.change + 1.0).abs() < 1e-9);
        assert!((quote.change_percent + 1.0).abs() < 1e-9);
        assert_eq!(quote.timestamp.timestamp(), 1_704_205_800);
    }

    #[test]
    fn stock_quote_needs_a_price() {
        let meta = ChartMeta {
            symbol: "SPY".into(),
            ..Default::default()
        };
        assert!(stock_quote("SPY", &meta).is_none());
    }

    #[test]
    fn crypto_price_requires_usd() {
        let p = SimplePrice {
            usd: None,
            ..Default::default()
        };
        assert!(crypto_price("bitcoin", &p).is_none());

        let p = SimplePrice {
            usd: Some(2.0),
            usd_24h_vol: Some(5.0),
            ..Default::default()
        };
        let price = crypto_price("bitcoin", &p).unwrap();
        assert_eq!(price.volume_24h, 5.0);
        assert_eq!(price.change_24h, 0.0);
    }
}
