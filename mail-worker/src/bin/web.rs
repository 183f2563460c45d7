//! Solmail Web Server - signup endpoints for the launch and newsletter lists.
//!
//! Each signup is stored and a confirmation email is enqueued; rendering and
//! delivery happen in the worker.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use solmail::db::PgStore;
use solmail::queue::redact_url;
use solmail::shutdown::shutdown_signal;
use solmail::{create_router, telemetry, AppState, Config, Publisher};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        broker_url = %redact_url(&config.broker_url),
        frontend_url = %config.frontend_url,
        "config_loaded"
    );

    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let publisher = Publisher::new(config.broker_url.clone(), config.retry_delay);

    let state = AppState::new(config.clone(), Arc::new(publisher), Arc::new(store));
    let app = create_router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("web_server_shutting_down");
        })
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}
