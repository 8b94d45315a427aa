use std::{
    env::var,
    net::{IpAddr, SocketAddr},
};

use anyhow::{Context, Result};
use market::Locale;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub version: String,
    pub default_language: Locale,
    pub use_live_data: bool,
    pub yahoo_base_url: String,
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8000,
            version: env!("CARGO_PKG_VERSION").to_string(),
            default_language: Locale::En,
            use_live_data: true,
            yahoo_base_url: market::YAHOO_BASE_URL.to_string(),
            coingecko_base_url: market::COINGECKO_BASE_URL.to_string(),
            coingecko_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = match var("HOST") {
            Ok(h) => h.parse().with_context(|| format!("HOST is not an IP address: {h}"))?,
            Err(_) => defaults.host,
        };
        let port = match var("PORT") {
            Ok(p) => p.parse().with_context(|| format!("PORT is not a port number: {p}"))?,
            Err(_) => defaults.port,
        };
        let use_live_data = match var("USE_LIVE_DATA") {
            Ok(v) => parse_bool(&v).with_context(|| format!("USE_LIVE_DATA is not a bool: {v}"))?,
            Err(_) => defaults.use_live_data,
        };

        Ok(Self {
            host,
            port,
            version: var("APP_VERSION").unwrap_or(defaults.version),
            default_language: var("DEFAULT_LANGUAGE")
                .map(|l| Locale::parse(&l))
                .unwrap_or(defaults.default_language),
            use_live_data,
            yahoo_base_url: var("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
            coingecko_base_url: var("COINGECKO_BASE_URL").unwrap_or(defaults.coingecko_base_url),
            coingecko_api_key: var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn default_binds_all_interfaces_on_8000() {
        let c = Config::default();
        assert_eq!(c.addr().to_string(), "0.0.0.0:8000");
        assert!(c.use_live_data);
    }
}
