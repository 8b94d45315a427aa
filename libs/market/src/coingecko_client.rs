use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use reqwest::{
    Client, Url,
    header::{HeaderMap, HeaderValue},
};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_api: String,
}

impl CoinGeckoClient {
    pub fn new(base_api: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            headers.insert("x-cg-demo-api-key", HeaderValue::from_str(&key)?);
        }

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
            std::env::var("COINGECKO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("COINGECKO_API_KEY").ok();
        Self::new(base_api, api_key)
    }

    pub fn base_api(&self) -> &str {
        &self.base_api
    }

    /// `base_api` plus `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_api)
            .with_context(|| format!("invalid coingecko base url: {}", self.base_api))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("coingecko base url cannot take a path: {}", self.base_api))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// USD price, 24h change and market cap for each id; 24h volume on request.
    /// Ids unknown to CoinGecko are simply absent from the map.
    pub async fn simple_price(
        &self,
        ids: &[String],
        include_volume: bool,
    ) -> Result<HashMap<String, SimplePrice>> {
        let ids = ids.join(",");
        debug!(%ids, include_volume, "requesting coingecko simple price");

        let res = self
            .client
            .get(self.url(&["simple", "price"])?)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
                ("include_market_cap", "true"),
                ("include_24hr_vol", if include_volume { "true" } else { "false" }),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decode coingecko simple price")?;

        Ok(res)
    }

    pub async fn market_chart(&self, coin_id: &str, days: u32) -> Result<MarketChart> {
        debug!(%coin_id, days, "requesting coingecko market chart");

        let res = self
            .client
            .get(self.url(&["coins", coin_id, "market_chart"])?)
            .query(&[("vs_currency", "usd"), ("days", &days.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("decode coingecko market chart for {coin_id}"))?;

        Ok(res)
    }

    pub async fn trending(&self) -> Result<TrendingResponse> {
        let res = self
            .client
            .get(self.url(&["search", "trending"])?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decode coingecko trending")?;

        Ok(res)
    }
}

//
// Match CoinGecko API JSON
// https://docs.coingecko.com/reference/simple-price
//
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SimplePrice {
    pub usd: Option<f64>,
    pub usd_market_cap: Option<f64>,
    pub usd_24h_vol: Option<f64>,
    pub usd_24h_change: Option<f64>,
}

/// `[unix_ms, value]` pairs.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
    #[serde(default)]
    pub market_caps: Vec<(f64, f64)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrendingResponse {
    #[serde(default)]
    pub coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendingEntry {
    pub item: TrendingItem,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendingItem {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_ids_are_encoded_as_one_segment() {
        let client = CoinGeckoClient::new("https://api.example.com/api/v3/", None).unwrap();
        let url = client.url(&["coins", "bad/id#x", "market_chart"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v3/coins/bad%2Fid%23x/market_chart"
        );
        assert!(CoinGeckoClient::new("not a url", None).unwrap().url(&["x"]).is_err());
    }

    #[test]
    fn simple_price_tolerates_missing_fields() {
        let json = r#"{"bitcoin":{"usd":67012.5,"usd_24h_change":-1.25},"ethereum":{"usd":3500}}"#;
        let res: HashMap<String, SimplePrice> = serde_json::from_str(json).unwrap();
        assert_eq!(res["bitcoin"].usd, Some(67012.5));
        assert_eq!(res["bitcoin"].usd_market_cap, None);
        assert_eq!(res["ethereum"].usd, Some(3500.0));
    }

    #[test]
    fn market_chart_pairs_decode() {
        let json = r#"{"prices":[[1704067200000,42280.2],[1704153600000,44187.1]],"total_volumes":[[1704067200000,1.1e10]]}"#;
        let chart: MarketChart = serde_json::from_str(json).unwrap();
        assert_eq!(chart.prices.len(), 2);
        assert!(chart.market_caps.is_empty());
        assert_eq!(chart.total_volumes[0].1, 1.1e10);
    }

    #[test]
    fn trending_rank_may_be_null() {
        let json = r#"{"coins":[{"item":{"id":"pepe","name":"Pepe","symbol":"PEPE","market_cap_rank":null,"score":0}}]}"#;
        let res: TrendingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(res.coins[0].item.market_cap_rank, None);
    }
}
