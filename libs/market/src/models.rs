use std::{fmt, str::FromStr};

use anyhow::{Error, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized OHLCV row. Stock and crypto history both end up in this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    /// Only CoinGecko reports market cap per point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
}

impl Bar {
    /// A bar for a price-only series: open, high and low all equal the price.
    pub fn from_price(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
            market_cap: None,
        }
    }

    pub fn date(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }
}

/// A single timestamped value of a derived series (equity, drawdown, returns).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Point {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Stock,
    Crypto,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Stock => "stock",
            AssetKind::Crypto => "crypto",
        }
    }
}

impl FromStr for AssetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "stocks" | "equity" => Ok(AssetKind::Stock),
            "crypto" | "cryptocurrency" | "coin" => Ok(AssetKind::Crypto),
            other => bail!("unknown asset type: {other}"),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// Match Yahoo Finance chart `range` values
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[default]
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "6mo")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "10y")]
    Year10,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 11] = [
        Period::Day1,
        Period::Day5,
        Period::Month1,
        Period::Month3,
        Period::Month6,
        Period::Year1,
        Period::Year2,
        Period::Year5,
        Period::Year10,
        Period::YearToDate,
        Period::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day1 => "1d",
            Period::Day5 => "5d",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
            Period::Month6 => "6mo",
            Period::Year1 => "1y",
            Period::Year2 => "2y",
            Period::Year5 => "5y",
            Period::Year10 => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }

    /// Smallest period covering a span of `days`, capped at two years.
    pub fn covering_days(days: i64) -> Self {
        match days {
            ..=7 => Period::Day5,
            8..=30 => Period::Month1,
            31..=90 => Period::Month3,
            91..=180 => Period::Month6,
            181..=365 => Period::Year1,
            _ => Period::Year2,
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Period::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::msg(format!("unsupported period: {s}")))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub volume: f64,
    /// Absent when the quote source does not report it.
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: f64,
    pub fifty_two_week_low: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    pub price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CryptoPrice {
    pub coin_id: String,
    pub price: f64,
    pub change_24h: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
}

/// Batch variant of [`CryptoPrice`], keyed by coin id by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CryptoQuote {
    pub price: f64,
    pub change_24h: f64,
    pub market_cap: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parses_case_insensitively() {
        assert_eq!("1MO".parse::<Period>().unwrap(), Period::Month1);
        assert_eq!(" ytd ".parse::<Period>().unwrap(), Period::YearToDate);
        assert!("3w".parse::<Period>().is_err());
    }

    #[test]
    fn period_covering_days_buckets() {
        assert_eq!(Period::covering_days(3), Period::Day5);
        assert_eq!(Period::covering_days(7), Period::Day5);
        assert_eq!(Period::covering_days(8), Period::Month1);
        assert_eq!(Period::covering_days(90), Period::Month3);
        assert_eq!(Period::covering_days(180), Period::Month6);
        assert_eq!(Period::covering_days(365), Period::Year1);
        assert_eq!(Period::covering_days(366), Period::Year2);
    }

    #[test]
    fn period_serializes_as_vendor_range() {
        let json = serde_json::to_string(&Period::Month6).unwrap();
        assert_eq!(json, "\"6mo\"");
    }

    #[test]
    fn asset_kind_accepts_aliases() {
        assert_eq!("Crypto".parse::<AssetKind>().unwrap(), AssetKind::Crypto);
        assert_eq!("stocks".parse::<AssetKind>().unwrap(), AssetKind::Stock);
        assert!("bond".parse::<AssetKind>().is_err());
    }
}
