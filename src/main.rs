// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Crucible-Tracker API Server
//!
//! Serves match history and windowed stats for Destiny 2 players, backed by
//! the Bungie.net API and an on-device cache.

use crucible_tracker::{
    config::Config,
    db::CacheDb,
    services::{BungieClient, TokenBucket, Tracker},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Crucible-Tracker API");

    // Open the cache in the background; requests wait for it (bounded)
    let cache = CacheDb::open(
        &config.cache_path,
        Duration::from_millis(config.cache_open_timeout_ms),
    );
    tracing::info!(path = %config.cache_path, "Opening cache");

    // One token bucket shared by every Bungie API call
    let limiter = Arc::new(TokenBucket::new(
        config.rate_max_tokens,
        config.rate_per_second,
    ));
    let client = Arc::new(BungieClient::new(
        config.bungie_api_key.clone(),
        config.bungie_base_url.clone(),
        limiter,
    ));
    tracing::info!(
        base_url = %config.bungie_base_url,
        max_tokens = config.rate_max_tokens,
        rate_per_second = config.rate_per_second,
        "Bungie client initialized"
    );

    let tracker = Tracker::new(config.clone(), client, cache.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        tracker,
    });

    // Build router
    let app = crucible_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = cache.flush().await {
        tracing::warn!(error = %e, "Cache flush on shutdown failed");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crucible_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
