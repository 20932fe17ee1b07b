//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the RxPad REST API on its own.
//!
//! ## Intended use
//! Useful for development and debugging. The workspace's main `rxpad-run` binary serves the
//! same router with the workspace-wide log filter.

use anyhow::Context;
use api_rest::{router, AppState};
use rxpad_core::CoreConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("RX_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY").context("API_KEY must be set")?;
    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);

    let state = tokio::task::spawn_blocking(move || AppState::open(&cfg, api_key)).await??;

    tracing::info!("-- Starting RxPad REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
