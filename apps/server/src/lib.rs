use std::{sync::Arc, time::Instant};

use axum::Router;
use market::MarketData;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;

use config::Config;

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<dyn MarketData>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(market: Arc<dyn MarketData>, config: Config) -> Self {
        Self {
            market,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Source for the dashboard pages; `None` means use the seeded sample data.
    pub fn live_source(&self) -> Option<&dyn MarketData> {
        self.config.use_live_data.then_some(self.market.as_ref())
    }
}

/// The full application: JSON API, PNG charts and dashboard pages.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .merge(dashboard::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
