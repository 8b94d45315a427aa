mod coingecko_client;
mod live_data;
mod yahoo_client;

pub mod chart;
pub mod i18n;
pub mod indicators;
pub mod models;
pub mod performance;
pub mod sample;

pub use coingecko_client::{CoinGeckoClient, DEFAULT_BASE_URL as COINGECKO_BASE_URL};
pub use i18n::Locale;
pub use live_data::{LiveDataFetcher, MAX_CRYPTO_DAYS, MarketData, bars_from_market_chart};
pub use models::{
    AssetKind, Bar, CryptoPrice, CryptoQuote, Period, Point, StockInfo, StockQuote, TrendingCoin,
};
pub use yahoo_client::{DEFAULT_BASE_URL as YAHOO_BASE_URL, YahooClient};
