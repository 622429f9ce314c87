//! Relay request types
//!
//! Shapes the browser sends to the relay routes. The relay never looks inside
//! the forwarded bodies; records like bookings or reviews stay opaque JSON.

use axum::body::Bytes;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Body of `POST /api/proxy-api`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyRequest {
    /// Root-relative path on the internal API, e.g. `/bookings?page=2`.
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Extra headers to forward. Scalars are stringified, anything else is dropped.
    #[serde(default)]
    pub headers: BTreeMap<String, serde_json::Value>,
}

impl ProxyRequest {
    /// Header pairs with their values rendered as strings.
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.headers.iter().filter_map(|(name, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((name.as_str(), rendered))
        })
    }

    /// Body to forward, if any. JSON `null` counts as absent.
    pub fn forwarded_body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref().filter(|b| !b.is_null())
    }
}

/// One part of a multipart upload, rebuilt before forwarding.
#[derive(Debug, Clone)]
pub enum UploadPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        data: Bytes,
    },
}

/// Parsed `POST /api/proxy-upload` request.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub url: Option<String>,
    pub method: Option<String>,
    pub parts: Vec<UploadPart>,
}

impl UploadForm {
    pub fn file_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, UploadPart::File { .. }))
            .count()
    }
}
