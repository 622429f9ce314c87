//! Geocoding relay client.
//!
//! Address and coordinate lookups go through the server so browsers never
//! call the third-party geocoder directly.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::Coordinates;
use crate::error::ApiResult;
use crate::services::upstream::RelayedResponse;

/// Forward lookups return at most this many candidates.
const FORWARD_LIMIT: &str = "5";

#[derive(Clone)]
pub struct GeocodingClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeocodingClient {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        tracing::info!(base_url = base_url, "Geocoding client initialized");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Coordinates to address.
    #[instrument(skip(self))]
    pub async fn reverse(&self, coords: Coordinates) -> ApiResult<RelayedResponse> {
        let query = vec![
            ("lat", coords.lat.to_string()),
            ("lon", coords.lng.to_string()),
        ];
        self.lookup("reverse", query).await
    }

    /// Address to candidate coordinates.
    #[instrument(skip(self))]
    pub async fn forward(&self, address: &str) -> ApiResult<RelayedResponse> {
        let query = vec![
            ("q", address.to_string()),
            ("limit", FORWARD_LIMIT.to_string()),
        ];
        self.lookup("search", query).await
    }

    async fn lookup(&self, endpoint: &str, mut query: Vec<(&str, String)>) -> ApiResult<RelayedResponse> {
        let url = format!("{}/{}", self.base_url, endpoint);

        query.push(("format", "json".to_string()));
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        debug!(url = %url, "Geocoding request");

        let response = self.client.get(&url).query(&query).send().await?;
        Ok(RelayedResponse::from_upstream(response).await?.without_cookies())
    }

    pub async fn health_check(&self) -> anyhow::Result<()> {
        self.client
            .get(&self.base_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        Ok(())
    }
}
