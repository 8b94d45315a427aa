use axum::Router;

use crate::AppState;

pub mod chart;
pub mod realtime;
pub mod system;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(realtime::router())
        .merge(system::router())
        .merge(chart::router())
}
