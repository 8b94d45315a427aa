use axum::{
    extract::{Query, State},
    response::Html,
};
use chrono::Utc;
use serde::Deserialize;

use super::html::{Page, cards, metric_card, table};
use super::{Tab, locale_for};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SystemQuery {
    pub lang: Option<String>,
}

pub async fn page(State(state): State<AppState>, Query(q): Query<SystemQuery>) -> Html<String> {
    let locale = locale_for(&state, q.lang.as_deref());
    let mut page = Page::new(locale, Tab::System);
    let config = &state.config;

    page.heading(page.t("system_title"));

    page.subheading(page.t("system_metrics"));
    page.push(cards(&[
        metric_card("Version", &config.version, None),
        metric_card("Uptime", &uptime(state.started_at.elapsed().as_secs()), None),
        metric_card(page.t("language"), locale.name(), None),
    ]));

    let status = if config.use_live_data {
        page.t("active")
    } else {
        page.t("inactive")
    };

    page.subheading(page.t("data_sources"));
    page.push(table(
        &["Source", "URL", page.t("status")],
        &[
            vec![
                "Yahoo Finance".to_string(),
                config.yahoo_base_url.clone(),
                status.to_string(),
            ],
            vec![
                "CoinGecko".to_string(),
                config.coingecko_base_url.clone(),
                status.to_string(),
            ],
            vec![
                "Sample data (seed 42)".to_string(),
                "-".to_string(),
                if config.use_live_data {
                    page.t("inactive")
                } else {
                    page.t("active")
                }
                .to_string(),
            ],
        ],
    ));

    page.subheading(page.t("api_status"));
    page.push(table(
        &[page.t("metric"), page.t("value")],
        &[
            vec!["/api/health".to_string(), page.t("connected").to_string()],
            vec!["/api/realtime".to_string(), page.t("connected").to_string()],
            vec![
                page.t("last_update").to_string(),
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ],
        ],
    ));

    page.render()
}

fn uptime(secs: u64) -> String {
    let (d, h, m, s) = (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60, secs % 60);
    if d > 0 {
        format!("{d}d {h}h {m}m")
    } else {
        format!("{h:02}:{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::uptime;

    #[test]
    fn formats_uptime() {
        assert_eq!(uptime(59), "00:00:59");
        assert_eq!(uptime(3_661), "01:01:01");
        assert_eq!(uptime(90_061), "1d 1h 1m");
    }
}
