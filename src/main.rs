use anyhow::Result;
use std::env;

use alora_relay::{app, config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging first so configuration warnings are visible
    let environment =
        config::Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
    logging::init_logging(&environment);

    // Load configuration
    let settings = config::Settings::from_env()?;

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr(),
        internal_api = %settings.internal_api_url,
        "Starting Alora relay"
    );

    // Create application state
    let state = app::AppState::from_settings(settings.clone())?;

    // Probe the internal API without blocking startup
    tokio::spawn({
        let state = state.clone();
        async move {
            match state.upstream.health_check().await {
                Ok(()) => tracing::info!("Internal API is reachable"),
                Err(e) => tracing::warn!(error = %e, "Internal API not reachable yet"),
            }
        }
    });

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(settings.server_addr()).await?;
    tracing::info!("Listening on {}", settings.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
