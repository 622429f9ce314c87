pub mod health;
pub mod navigation;
pub mod notifications;
pub mod proxy;
pub mod realtime;

use axum::{
    extract::DefaultBodyLimit,
    http::Uri,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::config::Settings;
use crate::error::ApiError;

/// Build the API router with all routes
pub fn api_router(settings: &Settings) -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Internal API relay
        .route("/api/proxy-api", post(proxy::proxy_api))
        .route(
            "/api/proxy-upload",
            post(proxy::proxy_upload).layer(DefaultBodyLimit::max(settings.max_upload_bytes)),
        )
        .route("/api/file/:id", get(proxy::download_file))
        // Geocoding relay
        .route("/api/navigation/reverse", get(navigation::reverse))
        .route("/api/navigation/forward", get(navigation::forward))
        // Real-time channel
        .route("/ws", get(realtime::ws_handler))
        .route("/socket", get(realtime::ws_handler))
        // Server-side push (internal API only)
        .route("/api/notifications/push", post(notifications::push_notification))
        .route("/api/realtime/online", get(notifications::online_users))
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
