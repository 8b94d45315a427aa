//! Server-rendered dashboard: market data, performance, backtest and system tabs.

use axum::{Router, routing::get};
use market::Locale;

use crate::AppState;

mod backtest;
pub mod html;
mod market_data;
mod performance;
mod system;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Performance,
    Backtest,
    Market,
    System,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Performance, Tab::Backtest, Tab::Market, Tab::System];

    pub fn path(&self) -> &'static str {
        match self {
            Tab::Performance => "/dashboard/performance",
            Tab::Backtest => "/dashboard/backtest",
            Tab::Market => "/dashboard/market",
            Tab::System => "/dashboard/system",
        }
    }

    pub fn label_key(&self) -> &'static str {
        match self {
            Tab::Performance => "tab_performance",
            Tab::Backtest => "tab_backtest",
            Tab::Market => "tab_market",
            Tab::System => "tab_system",
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(market_data::page))
        .route(Tab::Market.path(), get(market_data::page))
        .route(Tab::Performance.path(), get(performance::page))
        .route(Tab::Backtest.path(), get(backtest::page))
        .route(Tab::System.path(), get(system::page))
}

/// The `lang` query parameter, else the configured default.
fn locale_for(state: &AppState, lang: Option<&str>) -> Locale {
    lang.filter(|l| !l.trim().is_empty())
        .map(Locale::parse)
        .unwrap_or(state.config.default_language)
}

/// Treats empty form fields as absent.
fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
