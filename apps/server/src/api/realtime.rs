//! `/api/realtime/*`: thin JSON layer over [`market::MarketData`].

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use futures::{StreamExt, stream};
use indexmap::IndexMap;
use market::{Bar, MAX_CRYPTO_DAYS, Period};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_futures::Instrument;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Upper bound on in-flight vendor requests for one batch call.
const CONCURRENCY: usize = 4;

pub const INDEX_SYMBOLS: [&str; 6] = ["SPY", "QQQ", "DIA", "^GSPC", "^IXIC", "^DJI"];
pub const MAJOR_CRYPTOS: [&str; 5] = ["bitcoin", "ethereum", "binancecoin", "solana", "cardano"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/realtime/health", get(health))
        .route("/api/realtime/stock/data", post(stock_data))
        .route("/api/realtime/stock/info/:symbol", get(stock_info))
        .route("/api/realtime/stock/quote/:symbol", get(stock_quote))
        .route("/api/realtime/crypto/data", post(crypto_data))
        .route("/api/realtime/crypto/price/:coin_id", get(crypto_price))
        .route("/api/realtime/crypto/trending", get(trending))
        .route("/api/realtime/crypto/multiple", post(multiple_cryptos))
        .route("/api/realtime/market/overview", get(market_overview))
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            timestamp: Utc::now().to_rfc3339(),
            message: None,
        })
    }

    pub fn with_message(data: T, message: Option<String>) -> Json<Self> {
        let Json(mut env) = Self::ok(data);
        env.message = message;
        Json(env)
    }
}

#[derive(Debug, Deserialize)]
pub struct StockDataRequest {
    pub symbols: Vec<String>,
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    Period::default().to_string()
}

#[derive(Debug, Deserialize)]
pub struct CryptoDataRequest {
    pub coin_ids: Vec<String>,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// Per-symbol slot of a batch response.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SeriesEntry<L> {
    Data { data: Vec<Bar>, latest: L },
    Error { error: String },
}

#[derive(Debug, Serialize)]
pub struct StockLatest {
    pub close: f64,
    pub volume: f64,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct CryptoLatest {
    pub price: f64,
    pub market_cap: f64,
    pub volume: f64,
    pub date: String,
}

/// Trims, drops blanks and duplicates while keeping first-seen order.
fn clean_ids(ids: &[String], what: &str) -> ApiResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    if out.is_empty() {
        return Err(ApiError::bad_request(format!("{what} must not be empty")));
    }
    Ok(out)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "realtime-data-api",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Runs `fetch` for every id with bounded concurrency; results keep input order.
async fn fetch_all<'a, T, F, Fut>(ids: &'a [String], kind: &'static str, fetch: F) -> Vec<(String, T)>
where
    F: Fn(&'a str) -> Fut + Sync,
    Fut: Future<Output = T> + Send + 'a,
    T: Send,
{
    stream::iter(ids)
        .map(|id| {
            let span = tracing::info_span!("fetch", %kind, %id);
            let fut = fetch(id.as_str());
            async move { (id.clone(), fut.await) }.instrument(span)
        })
        .boxed()
        .buffered(CONCURRENCY)
        .collect()
        .await
}

async fn stock_data(
    State(state): State<AppState>,
    Json(req): Json<StockDataRequest>,
) -> ApiResult<Json<Envelope<IndexMap<String, SeriesEntry<StockLatest>>>>> {
    let symbols = clean_ids(&req.symbols, "symbols")?;
    let period: Period = req
        .period
        .parse()
        .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?;

    let market = state.market.as_ref();
    let fetched = fetch_all(&symbols, "stock", |s| market.get_stock_data(s, period)).await;

    let data = fetched
        .into_iter()
        .map(|(symbol, result)| {
            let entry = match result {
                Ok(bars) => match bars.last() {
                    Some(last) => SeriesEntry::Data {
                        latest: StockLatest {
                            close: last.close,
                            volume: last.volume,
                            date: last.date(),
                        },
                        data: bars,
                    },
                    None => no_data(),
                },
                Err(e) => {
                    warn!(%symbol, error = ?e, "stock data unavailable");
                    no_data()
                }
            };
            (symbol, entry)
        })
        .collect::<IndexMap<_, _>>();

    info!(symbols = data.len(), %period, "served stock data");
    Ok(Envelope::ok(data))
}

fn no_data<L>() -> SeriesEntry<L> {
    SeriesEntry::Error {
        error: "No data available".to_string(),
    }
}

async fn stock_info(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Envelope<market::StockInfo>>> {
    match state.market.get_stock_info(&symbol).await {
        Ok(Some(info)) => Ok(Envelope::ok(info)),
        Ok(None) => Err(ApiError::not_found(format!("Stock {symbol} not found"))),
        Err(e) => Err(ApiError::upstream("fetch stock info", &e)),
    }
}

async fn stock_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Envelope<market::StockQuote>>> {
    match state.market.get_stock_quote(&symbol).await {
        Ok(Some(quote)) => Ok(Envelope::ok(quote)),
        Ok(None) => Err(ApiError::not_found(format!("Quote for {symbol} not found"))),
        Err(e) => Err(ApiError::upstream("fetch stock quote", &e)),
    }
}

async fn crypto_data(
    State(state): State<AppState>,
    Json(req): Json<CryptoDataRequest>,
) -> ApiResult<Json<Envelope<IndexMap<String, SeriesEntry<CryptoLatest>>>>> {
    let coin_ids = clean_ids(&req.coin_ids, "coin_ids")?;
    if req.days == 0 {
        return Err(ApiError::bad_request("days must be at least 1"));
    }
    let message = (req.days > MAX_CRYPTO_DAYS)
        .then(|| format!("days limited to {MAX_CRYPTO_DAYS}"));
    let days = req.days.min(MAX_CRYPTO_DAYS);

    let market = state.market.as_ref();
    let fetched = fetch_all(&coin_ids, "crypto", |id| market.get_crypto_history(id, days)).await;

    let data = fetched
        .into_iter()
        .map(|(coin_id, result)| {
            let entry = match result {
                Ok(bars) => match bars.last() {
                    Some(last) => SeriesEntry::Data {
                        latest: CryptoLatest {
                            price: last.close,
                            market_cap: last.market_cap.unwrap_or(0.0),
                            volume: last.volume,
                            date: last.date(),
                        },
                        data: bars,
                    },
                    None => no_data(),
                },
                Err(e) => {
                    warn!(%coin_id, error = ?e, "crypto history unavailable");
                    no_data()
                }
            };
            (coin_id, entry)
        })
        .collect::<IndexMap<_, _>>();

    info!(coins = data.len(), days, "served crypto data");
    Ok(Envelope::with_message(data, message))
}

async fn crypto_price(
    State(state): State<AppState>,
    Path(coin_id): Path<String>,
) -> ApiResult<Json<Envelope<market::CryptoPrice>>> {
    match state.market.get_crypto_price(&coin_id).await {
        Ok(Some(price)) => Ok(Envelope::ok(price)),
        Ok(None) => Err(ApiError::not_found(format!("Crypto {coin_id} not found"))),
        Err(e) => Err(ApiError::upstream("fetch crypto price", &e)),
    }
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<TrendingQuery>,
) -> ApiResult<Json<Envelope<Value>>> {
    let coins = state
        .market
        .get_trending_cryptos(q.limit)
        .await
        .map_err(|e| ApiError::upstream("fetch trending cryptos", &e))?;
    Ok(Envelope::ok(json!({ "trending": coins })))
}

async fn multiple_cryptos(
    State(state): State<AppState>,
    Json(coin_ids): Json<Vec<String>>,
) -> ApiResult<Json<Envelope<BTreeMap<String, market::CryptoQuote>>>> {
    let coin_ids = clean_ids(&coin_ids, "coin_ids")?;
    let quotes = state
        .market
        .get_multiple_cryptos(&coin_ids)
        .await
        .map_err(|e| ApiError::upstream("fetch crypto prices", &e))?;
    Ok(Envelope::ok(quotes))
}

#[derive(Debug, Serialize)]
pub struct MarketOverview {
    pub stocks: IndexMap<String, market::StockQuote>,
    pub cryptos: BTreeMap<String, market::CryptoQuote>,
}

async fn market_overview(State(state): State<AppState>) -> Json<Envelope<MarketOverview>> {
    let market = state.market.as_ref();
    let symbols: Vec<String> = INDEX_SYMBOLS.iter().map(|s| s.to_string()).collect();
    let coin_ids: Vec<String> = MAJOR_CRYPTOS.iter().map(|s| s.to_string()).collect();

    let (quotes, cryptos) = tokio::join!(
        fetch_all(&symbols, "index", |s| market.get_stock_quote(s)),
        market.get_multiple_cryptos(&coin_ids),
    );

    let stocks = quotes
        .into_iter()
        .filter_map(|(symbol, result)| match result {
            Ok(Some(quote)) => Some((symbol, quote)),
            Ok(None) => None,
            Err(e) => {
                warn!(%symbol, error = ?e, "index quote skipped");
                None
            }
        })
        .collect();

    let cryptos = cryptos.unwrap_or_else(|e| {
        warn!(error = ?e, "crypto overview skipped");
        BTreeMap::new()
    });

    Envelope::ok(MarketOverview { stocks, cryptos })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_ids_dedups_and_keeps_order() {
        let ids = vec![" MSFT".into(), "AAPL".into(), "".into(), "MSFT".into()];
        assert_eq!(clean_ids(&ids, "symbols").unwrap(), vec!["MSFT", "AAPL"]);
    }

    #[test]
    fn clean_ids_rejects_blank_lists() {
        let err = clean_ids(&["  ".to_string()], "symbols").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "symbols must not be empty");
    }

    #[test]
    fn error_entry_serializes_flat() {
        let entry: SeriesEntry<StockLatest> = no_data();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, json!({ "error": "No data available" }));
    }
}
