//! techshop-server — TechShop Pro storefront backend
//!
//! Long-running HTTP service that:
//! - Serves the product catalog with filtering, search and pagination
//! - Manages user accounts and JWT authentication
//! - Places orders with atomic stock reservation
//! - Confirms Stripe payments exactly once

use techshop_server::{AppState, Config, api};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "techshop_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting techshop-server (env: {})", config.environment);

    // Initialize application state (connects to Postgres and runs migrations)
    let state = AppState::new(config.clone()).await?;

    let app = api::create_app(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("techshop-server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("techshop-server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("Shutdown signal received");
}
