// Hospital Revenue - Web Server
// REST API with Axum over the SQLite revenue store

use hospital_revenue::api::{router, AppState};
use hospital_revenue::{config, Config, RecordStore, RevenueEngine, SqliteStore};
use std::sync::Arc;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_logging();

    let config = Config::from_env();
    tracing::info!(version = config::APP_VERSION, "{} server starting", config::APP_NAME);

    // Read-only pool; connections open on first use
    let store = Arc::new(SqliteStore::open(&config.db_path));
    if !store.ping() {
        tracing::warn!(
            path = %config.db_path.display(),
            "database not reachable yet; run `hospital-revenue import <csv>` first"
        );
    }

    let engine = RevenueEngine::new(store, config.query);
    let app = router(AppState::new(engine, config.query_timeout));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    tracing::info!("   Health check: /health");
    tracing::info!("   Revenue API:  /api/hospitals/revenue");
    tracing::info!("   Stats API:    /api/hospitals/stats, /api/hospitals/stats/monthly");
    tracing::info!("   Trend API:    /api/hospitals/trend");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
