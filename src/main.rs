use anyhow::Context;
use api_rest::{AppState, router};
use rxpad_core::CoreConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the RxPad application
///
/// Loads `.env`, resolves configuration once, opens the database and blob store, and serves
/// the REST API (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `RX_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `API_KEY`: shared secret expected in the `x-api-key` header (required)
/// - `DATABASE_URL`: SQLite database path or `sqlite://` URL (default: "prescription_system.db")
/// - `RX_BLOB_BACKEND`: `local` or `s3`, with the matching `RX_BLOB_*` / `S3_*` settings
/// - `WKHTMLTOPDF_PATH`: renderer binary (default: "wkhtmltopdf")
/// - `RX_DOWNLOAD_URL_TTL_SECS`: lifetime of signed download URLs (default: 3600)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rxpad_run=info".parse()?)
                .add_directive("rxpad_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr: SocketAddr = std::env::var("RX_REST_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()?;
    let api_key = std::env::var("API_KEY").context("API_KEY must be set")?;
    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);

    let state = tokio::task::spawn_blocking(move || AppState::open(&cfg, api_key)).await??;

    tracing::info!("++ Starting RxPad REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
