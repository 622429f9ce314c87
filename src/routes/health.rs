use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
    pub realtime: RealtimeHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub internal_api: String,
    pub geocoding: String,
    pub api_key_configured: bool,
}

#[derive(Serialize)]
pub struct RealtimeHealth {
    pub online_users: usize,
    pub connections: usize,
}

/// Health check endpoint - public
///
/// Always 200: the relay itself is up even when a dependency is not.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    // Check upstreams in parallel
    let (internal_result, geocoding_result) = tokio::join!(
        state.upstream.health_check(),
        state.geocoder.health_check(),
    );

    let api_key_configured = state.upstream.ensure_configured().is_ok();
    let healthy = internal_result.is_ok() && geocoding_result.is_ok() && api_key_configured;

    if let Err(e) = &internal_result {
        tracing::warn!(error = %e, "Internal API health check failed");
    }
    if let Err(e) = &geocoding_result {
        tracing::warn!(error = %e, "Geocoding health check failed");
    }

    let label = |ok: bool| (if ok { "ok" } else { "error" }).to_string();

    Json(HealthResponse {
        status: (if healthy { "healthy" } else { "degraded" }).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: ServiceHealth {
            internal_api: label(internal_result.is_ok()),
            geocoding: label(geocoding_result.is_ok()),
            api_key_configured,
        },
        realtime: RealtimeHealth {
            online_users: state.hub.online_users().len(),
            connections: state.hub.connection_count(),
        },
    })
}
