//! Client for the internal marketplace API.
//!
//! Forwards browser requests with the server-held API key injected and hands
//! the upstream answer back untouched:
//! - JSON relay (`/api/proxy-api`)
//! - multipart relay (`/api/proxy-upload`)
//! - streamed file download (`/api/file/:id`)

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::{multipart, Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::domain::{ProxyRequest, UploadPart};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{RequestIdExt, X_REQUEST_ID};

/// Header carrying the server-held credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Client-supplied headers that are never forwarded.
const BLOCKED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "cookie",
    API_KEY_HEADER,
    "x-request-id",
    // Responses are relayed without Content-Encoding, so they must arrive uncompressed
    "accept-encoding",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers reproduced on streamed file downloads.
const FILE_HEADERS: [HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::CONTENT_DISPOSITION,
    header::CONTENT_LENGTH,
    header::SET_COOKIE,
];

/// Client for the internal API.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Context copied from the inbound browser request.
#[derive(Debug, Clone, Default)]
pub struct Forwarded {
    pub cookie: Option<HeaderValue>,
    pub request_id: Option<String>,
}

impl Forwarded {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            cookie: headers.get(header::COOKIE).cloned(),
            request_id: headers.request_id().map(str::to_string),
        }
    }
}

impl UpstreamClient {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        tracing::info!(base_url = base_url, has_api_key = api_key.is_some(), "Upstream client initialized");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Fails with a 500 when the relay has no credential to inject.
    pub fn ensure_configured(&self) -> ApiResult<&str> {
        self.api_key.as_deref().ok_or(ApiError::MissingApiKey)
    }

    /// Attach the credential, cookie and request id.
    fn authorize(&self, mut req: RequestBuilder, api_key: &str, fwd: &Forwarded) -> RequestBuilder {
        req = req.header(API_KEY_HEADER, api_key);

        if let Some(cookie) = &fwd.cookie {
            req = req.header(header::COOKIE, cookie.clone());
        }
        if let Some(rid) = &fwd.request_id {
            req = req.header(X_REQUEST_ID, rid);
        }

        req
    }

    /// Relay a JSON proxy request.
    #[instrument(skip(self, request, fwd), fields(url = %request.url))]
    pub async fn relay(&self, request: ProxyRequest, fwd: &Forwarded) -> ApiResult<RelayedResponse> {
        let api_key = self.ensure_configured()?;
        let path = validate_target_path(&request.url)?;
        let method = parse_method(request.method.as_deref(), Method::GET)?;

        let mut req = self
            .client
            .request(method.clone(), format!("{}{}", self.base_url, path));

        for (name, value) in request.header_pairs() {
            match forwardable_header(name, &value) {
                Some((name, value)) => req = req.header(name, value),
                None => debug!(header = name, "Dropping client header"),
            }
        }

        req = self.authorize(req, api_key, fwd);

        if let Some(body) = request.forwarded_body() {
            if method != Method::GET && method != Method::HEAD {
                req = req.json(body);
            }
        }

        debug!(method = %method, path = path, "Relaying request");

        let response = req.send().await?;
        RelayedResponse::from_upstream(response).await
    }

    /// Relay a multipart upload, rebuilding the form part by part.
    #[instrument(skip(self, parts, fwd), fields(part_count = parts.len()))]
    pub async fn relay_multipart(
        &self,
        url: &str,
        method: Option<&str>,
        parts: Vec<UploadPart>,
        fwd: &Forwarded,
    ) -> ApiResult<RelayedResponse> {
        let api_key = self.ensure_configured()?;
        let path = validate_target_path(url)?;
        let method = parse_method(method, Method::POST)?;

        let mut form = multipart::Form::new();
        for part in parts {
            form = match part {
                UploadPart::Text { name, value } => form.text(name, value),
                UploadPart::File {
                    name,
                    file_name,
                    content_type,
                    data,
                } => {
                    let len = data.len() as u64;
                    let mut file = multipart::Part::stream_with_length(reqwest::Body::from(data), len)
                        .file_name(file_name);
                    if let Some(mime) = content_type {
                        file = file.mime_str(&mime).map_err(|_| {
                            ApiError::bad_request(format!("Invalid content type for field '{}'", name))
                        })?;
                    }
                    form.part(name, file)
                }
            };
        }

        let req = self
            .client
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .multipart(form);
        let req = self.authorize(req, api_key, fwd);

        debug!(method = %method, path = path, "Relaying upload");

        let response = req.send().await?;
        RelayedResponse::from_upstream(response).await
    }

    /// Stream a stored file back to the browser.
    #[instrument(skip(self, fwd))]
    pub async fn stream_file(&self, id: &str, fwd: &Forwarded) -> ApiResult<Response> {
        let api_key = self.ensure_configured()?;
        let url = self.file_url(id)?;

        let req = self.authorize(self.client.get(url), api_key, fwd);
        let upstream = req.send().await?;

        let status = upstream.status();
        let mut headers = HeaderMap::new();
        for name in &FILE_HEADERS {
            for value in upstream.headers().get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        if !status.is_success() {
            warn!(status = %status, "Upstream file request not successful");
        }

        let mut response = Body::from_stream(upstream.bytes_stream()).into_response();
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn file_url(&self, id: &str) -> ApiResult<url::Url> {
        if id.trim().is_empty() {
            return Err(ApiError::bad_request("File id is required"));
        }

        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| ApiError::internal(format!("Invalid internal API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::internal("Internal API URL cannot be a base"))?
            .pop_if_empty()
            .extend(["files", id, "download"]);
        Ok(url)
    }

    /// Check the internal API answers at all.
    pub async fn health_check(&self) -> anyhow::Result<()> {
        self.client
            .get(&self.base_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        Ok(())
    }
}

/// Require a root-relative path: one leading `/`, not a `//host` reference.
pub fn validate_target_path(url: &str) -> ApiResult<&str> {
    if !url.starts_with('/') || url.starts_with("//") {
        return Err(ApiError::bad_request("url must be a root-relative path"));
    }
    if url.chars().any(|c| c.is_control() || c == '\\') {
        return Err(ApiError::bad_request("url contains invalid characters"));
    }
    Ok(url)
}

/// Parse a client-supplied method, falling back to `default` when absent.
pub fn parse_method(raw: Option<&str>, default: Method) -> ApiResult<Method> {
    let Some(raw) = raw.map(str::trim).filter(|m| !m.is_empty()) else {
        return Ok(default);
    };

    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        _ => Err(ApiError::bad_request(format!("Unsupported method: {}", raw))),
    }
}

fn forwardable_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    if BLOCKED_HEADERS.contains(&name.as_str()) {
        return None;
    }
    let value = HeaderValue::from_str(value).ok()?;
    Some((name, value))
}

fn is_json(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Upstream answer as handed back to the browser.
#[derive(Debug)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub set_cookies: Vec<HeaderValue>,
    pub body: RelayedBody,
}

#[derive(Debug)]
pub enum RelayedBody {
    Json(serde_json::Value),
    Raw(Bytes),
}

impl RelayedResponse {
    pub async fn from_upstream(response: reqwest::Response) -> ApiResult<Self> {
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .cloned()
            .collect();

        let bytes = response.bytes().await?;
        let body = if is_json(content_type.as_ref()) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => RelayedBody::Json(value),
                Err(_) => RelayedBody::Raw(bytes),
            }
        } else {
            RelayedBody::Raw(bytes)
        };

        debug!(status = %status, json = matches!(body, RelayedBody::Json(_)), "Upstream responded");

        Ok(Self {
            status,
            content_type,
            set_cookies,
            body,
        })
    }

    /// Drop upstream cookies; used for third-party lookups.
    pub fn without_cookies(mut self) -> Self {
        self.set_cookies.clear();
        self
    }
}

impl IntoResponse for RelayedResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            RelayedBody::Json(value) => Json(value).into_response(),
            RelayedBody::Raw(bytes) => bytes.into_response(),
        };

        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.remove(header::CONTENT_TYPE);
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        for cookie in self.set_cookies {
            headers.append(header::SET_COOKIE, cookie);
        }

        response
    }
}
