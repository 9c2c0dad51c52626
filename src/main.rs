use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kra_pin_relay::config::Config;
use kra_pin_relay::handlers::{self, AppState};
use kra_pin_relay::relay::LookupRelay;

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, builds the lookup relay and
/// starts the Axum server with per-IP rate limiting on the lookup route.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kra_pin_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let relay = LookupRelay::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
    tracing::info!("PIN checker relay initialized: {}", config.lookup_url);

    let app_state = Arc::new(AppState { relay });

    // Rate limiter: 10 requests/second per IP, burst of 20.
    // Health check bypasses rate limiting
    let lookup = handlers::rate_limited_lookup_routes(Duration::from_millis(100), 20)?;
    let app = handlers::app(app_state, lookup);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
