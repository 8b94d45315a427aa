use std::sync::Arc;

use anyhow::{Context, Result};
use market::{CoinGeckoClient, LiveDataFetcher, YahooClient};
use server::{AppState, config::Config};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let fetcher = LiveDataFetcher::new(
        YahooClient::new(config.yahoo_base_url.clone()).context("init yahoo client failed")?,
        CoinGeckoClient::new(
            config.coingecko_base_url.clone(),
            config.coingecko_api_key.clone(),
        )
        .context("init coingecko client failed")?,
    );

    if !config.use_live_data {
        warn!("live data disabled, dashboard pages show sample data");
    }

    let addr = config.addr();
    let state = AppState::new(Arc::new(fetcher), config);
    let app = server::app(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr} failed"))?;
    info!(%addr, "dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv()  => {},
                }
            }
            _ => {
                warn!("failed to install signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
