//! Service layer modules for external integrations.
//!
//! Contains the internal API relay client, the geocoding client and the
//! real-time notification hub.

pub mod geocoding;
pub mod realtime;
pub mod upstream;

pub use geocoding::GeocodingClient;
pub use realtime::NotificationHub;
pub use upstream::{Forwarded, RelayedResponse, UpstreamClient};

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::config::Settings;

/// Shared HTTP client for every outbound call.
pub fn build_http_client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(settings.upstream_timeout_seconds))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}
