use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use market::i18n::available_languages;
use serde_json::{Value, json};

use crate::AppState;

pub const SERVICE_NAME: &str = "financial-dashboard";

const FEATURES: [&str; 5] = [
    "realtime market data",
    "performance analysis",
    "backtest results",
    "multi-language dashboard",
    "server-side charts",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/info", get(info))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": state.config.version,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
        "features": FEATURES,
    }))
}

async fn info(State(state): State<AppState>) -> Json<Value> {
    let languages: Vec<Value> = available_languages()
        .into_iter()
        .map(|(code, name)| json!({ "code": code, "name": name }))
        .collect();

    Json(json!({
        "name": SERVICE_NAME,
        "version": state.config.version,
        "default_language": state.config.default_language.code(),
        "languages": languages,
        "live_data": state.config.use_live_data,
        "data_sources": {
            "stocks": state.config.yahoo_base_url,
            "crypto": state.config.coingecko_base_url,
        },
        "endpoints": {
            "health": "/api/health",
            "info": "/api/info",
            "realtime": "/api/realtime",
            "chart": "/api/chart/{asset}/{id}",
            "dashboard": "/dashboard/market",
        },
    }))
}
