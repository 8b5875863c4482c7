//! Tweet AI Monitor — Binary Entrypoint
//! Boots the Axum HTTP server the dashboard talks to and owns the single
//! monitor engine handle.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tweet_ai_monitor::api::{create_router, AppState};
use tweet_ai_monitor::config::{DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};
use tweet_ai_monitor::engine::MonitorEngine;
use tweet_ai_monitor::metrics::Metrics;
use tweet_ai_monitor::store::RecordStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tweet_ai_monitor=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();

    let data_dir = std::env::var("MONITOR_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let config_path = std::env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let store = Arc::new(RecordStore::new(data_dir));
    let engine = Arc::new(MonitorEngine::new(store.clone()));

    let metrics = Metrics::init();
    let state = AppState {
        engine,
        store,
        config_path,
    };
    let router = create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "tweet monitor listening");
    axum::serve(listener, router).await?;
    Ok(())
}
