use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use reqwest::{
    Client, Url,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use serde::Deserialize;
use tracing::debug;

use crate::models::{Bar, Period};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

const NOT_FOUND: &str = "Not Found";

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_api: String,
}

impl YahooClient {
    pub fn new(base_api: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // Yahoo rejects requests without a browser-like agent.
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            base_api: base_api.into(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let base_api =
            std::env::var("YAHOO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_api)
    }

    pub fn base_api(&self) -> &str {
        &self.base_api
    }

    /// Chart endpoint with `symbol` percent-encoded as a single path segment.
    fn chart_url(&self, symbol: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_api)
            .with_context(|| format!("invalid yahoo base url: {}", self.base_api))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("yahoo base url cannot take a path: {}", self.base_api))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    /// Daily bars plus quote metadata for `symbol` over `period`.
    /// Returns `None` when Yahoo does not know the symbol.
    pub async fn fetch_chart(&self, symbol: &str, period: Period) -> Result<Option<ChartData>> {
        let url = self.chart_url(symbol)?;

        debug!(%symbol, range = period.as_str(), "requesting yahoo chart");

        let res = self
            .client
            .get(url)
            .query(&[("range", period.as_str()), ("interval", "1d")])
            .send()
            .await?;

        // Unknown symbols come back as 404 with an error document, so parse before
        // looking at the status.
        let status = res.status();
        let body: ChartResponse = res
            .json()
            .await
            .with_context(|| format!("decode yahoo chart for {symbol} (HTTP {status})"))?;

        if let Some(err) = body.chart.error {
            if err.code == NOT_FOUND {
                return Ok(None);
            }
            bail!("yahoo error for {symbol}: {} - {}", err.code, err.description);
        }

        Ok(body.chart.result.and_then(|r| r.into_iter().next()))
    }
}

//
// Match Yahoo Finance chart JSON
// GET /v8/finance/chart/{symbol}
//
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartData {
    pub meta: ChartMeta,

    #[serde(default)]
    pub timestamp: Vec<i64>,

    pub indicators: Indicators,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: String,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_volume: Option<f64>,
    pub regular_market_time: Option<i64>,
    pub chart_previous_close: Option<f64>,
    pub previous_close: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteColumns>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QuoteColumns {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl ChartData {
    /// Zip the columnar quote arrays into rows. Rows missing any price are dropped
    /// (Yahoo emits nulls for halted sessions); a missing volume counts as 0.
    pub fn bars(&self) -> Vec<Bar> {
        let Some(quote) = self.indicators.quote.first() else {
            return Vec::new();
        };

        let col = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let timestamp = DateTime::<Utc>::from_timestamp(ts, 0)?;
                Some(Bar {
                    timestamp,
                    open: col(&quote.open, i)?,
                    high: col(&quote.high, i)?,
                    low: col(&quote.low, i)?,
                    close: col(&quote.close, i)?,
                    volume: col(&quote.volume, i).unwrap_or(0.0),
                    market_cap: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_url_encodes_symbol() {
        let client = YahooClient::new("https://query1.example.com").unwrap();
        let url = client.chart_url("AAPL#<x>").unwrap();
        assert_eq!(
            url.as_str(),
            "https://query1.example.com/v8/finance/chart/AAPL%23%3Cx%3E"
        );
        assert_eq!(
            client.chart_url("BRK/B").unwrap().path(),
            "/v8/finance/chart/BRK%2FB"
        );
    }

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "AAPL",
                    "longName": "Apple Inc.",
                    "regularMarketPrice": 190.5,
                    "regularMarketVolume": 51000000,
                    "chartPreviousClose": 188.0,
                    "fiftyTwoWeekHigh": 199.6,
                    "fiftyTwoWeekLow": 164.1
                },
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open":   [187.1, null, 184.2],
                        "high":   [188.4, 186.0, 185.9],
                        "low":    [183.9, 183.4, 183.4],
                        "close":  [185.6, 184.2, 181.9],
                        "volume": [82488700, 58414500, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    fn chart() -> ChartData {
        let res: ChartResponse = serde_json::from_str(CHART).unwrap();
        res.chart.result.unwrap().remove(0)
    }

    #[test]
    fn bars_drop_rows_with_missing_prices() {
        let bars = chart().bars();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 185.6);
        assert_eq!(bars[1].open, 184.2);
    }

    #[test]
    fn missing_volume_becomes_zero() {
        let bars = chart().bars();
        assert_eq!(bars[0].volume, 82488700.0);
        assert_eq!(bars[1].volume, 0.0);
        assert!(bars.iter().all(|b| b.market_cap.is_none()));
    }

    #[test]
    fn meta_fields_are_camel_case() {
        let meta = chart().meta;
        assert_eq!(meta.long_name.as_deref(), Some("Apple Inc."));
        assert_eq!(meta.regular_market_price, Some(190.5));
        assert_eq!(meta.fifty_two_week_low, Some(164.1));
        assert_eq!(meta.market_cap, None);
    }

    #[test]
    fn chart_without_timestamps_has_no_bars() {
        let json = r#"{"meta": {"symbol": "XYZ"}, "indicators": {"quote": [{}]}}"#;
        let data: ChartData = serde_json::from_str(json).unwrap();
        assert!(data.bars().is_empty());
    }

    #[test]
    fn vendor_error_document_parses() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let res: ChartResponse = serde_json::from_str(json).unwrap();
        assert!(res.chart.result.is_none());
        assert_eq!(res.chart.error.unwrap().code, NOT_FOUND);
    }
}
