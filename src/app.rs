use anyhow::Result;
use axum::{http::HeaderValue, Router};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::JwtKeys;
use crate::config::Settings;
use crate::middleware::{request_id_layer, X_REQUEST_ID};
use crate::routes;
use crate::services::{build_http_client, GeocodingClient, NotificationHub, UpstreamClient};

/// Shared application state
pub struct AppState {
    pub settings: Settings,
    pub upstream: UpstreamClient,
    pub geocoder: GeocodingClient,
    pub tokens: JwtKeys,
    pub hub: NotificationHub,
}

impl AppState {
    pub fn new(
        settings: Settings,
        upstream: UpstreamClient,
        geocoder: GeocodingClient,
        tokens: JwtKeys,
        hub: NotificationHub,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            upstream,
            geocoder,
            tokens,
            hub,
        })
    }

    /// Build every component from settings, sharing one HTTP client.
    pub fn from_settings(settings: Settings) -> Result<Arc<Self>> {
        let http_client = build_http_client(&settings)?;

        let upstream = UpstreamClient::new(
            http_client.clone(),
            &settings.internal_api_url,
            settings.api_key.clone(),
        );
        let geocoder = GeocodingClient::new(
            http_client,
            &settings.geocoding_url,
            settings.geocoding_api_key.clone(),
        );
        let tokens = JwtKeys::new(&settings.jwt_secret);

        Ok(Self::new(settings, upstream, geocoder, tokens, NotificationHub::new()))
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(&state.settings);

    // Build trace layer (use DEBUG for spans to reduce overhead at INFO level)
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    // Request ID layers
    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::api_router(&state.settings))
        // Middleware stack (applied bottom-up)
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Dev reloads issue many preflights; cache them longer there
    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    // Credentials are required so the session cookie rides along to the proxy
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            X_REQUEST_ID,
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
