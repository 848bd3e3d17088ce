mod api;
mod config;
mod error;
mod models;
mod serial;
mod utils;

use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;

use config::AppConfig;
use serial::ScaleReader;

/// Resolve when Ctrl+C is received
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested. Stopping gracefully."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match AppConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let reader = Arc::new(ScaleReader::new(config.engine, config.backoff));
    info!("Starting ScaleReader");
    reader.start()?;

    let app = api::router(Arc::clone(&reader), &config.server.cors_origins);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Weighing scale API listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &served {
        error!("Server error: {}", e);
    }

    // stop() waits on the reader thread, keep it off the async workers
    info!("Stopping ScaleReader");
    tokio::task::spawn_blocking(move || reader.stop()).await?;

    served?;
    Ok(())
}
