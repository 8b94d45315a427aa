use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use market::{AssetKind, MAX_CRYPTO_DAYS, Period, chart};
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub period: Option<String>,
    pub days: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chart/:asset/:id", get(price_png))
}

/// PNG price chart for a stock symbol or CoinGecko coin id.
async fn price_png(
    State(state): State<AppState>,
    Path((asset, id)): Path<(String, String)>,
    Query(q): Query<ChartQuery>,
) -> ApiResult<impl IntoResponse> {
    let asset: AssetKind = asset
        .parse()
        .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?;

    let bars = match asset {
        AssetKind::Stock => {
            let period = match q.period.as_deref() {
                Some(p) => p
                    .parse()
                    .map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?,
                None => Period::default(),
            };
            state.market.get_stock_data(&id, period).await
        }
        AssetKind::Crypto => {
            let days = q.days.unwrap_or(30).clamp(1, MAX_CRYPTO_DAYS);
            state.market.get_crypto_history(&id, days).await
        }
    }
    .map_err(|e| ApiError::upstream("fetch chart data", &e))?;

    if bars.is_empty() {
        return Err(ApiError::not_found(format!("No data available for {id}")));
    }

    let points = bars.len();
    let title = id.clone();
    let png = tokio::task::spawn_blocking(move || {
        chart::render_png(&chart::price_chart(&title, &bars))
    })
    .await
    .map_err(anyhow::Error::from)??;

    info!(%asset, %id, points, bytes = png.len(), "rendered chart");
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}
