//! Shared harness for the integration tests.
//!
//! Each test starts two servers on ephemeral ports:
//! - a mock upstream standing in for both the internal API and the geocoder
//! - the relay itself, configured to point at the mock

#![allow(dead_code)]

use alora_relay::{auth::Role, create_app, AppState, Settings};
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_JWT_SECRET: &str = "test-jwt-secret";

pub struct TestRelay {
    pub base_url: String,
    pub addr: SocketAddr,
    pub upstream_url: String,
    pub state: Arc<AppState>,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws{}", self.addr, query)
    }

    pub fn token_for(&self, user_id: &str) -> String {
        self.state
            .tokens
            .issue(user_id, Some(Role::Customer), Duration::from_secs(600))
            .expect("token")
    }
}

pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("server error: {}", e);
        }
    });
    addr
}

/// Start a mock upstream and a relay in front of it.
pub async fn start_relay(api_key: Option<&str>) -> TestRelay {
    start_relay_with(api_key, |_| {}).await
}

/// Like [`start_relay`], with a hook to adjust settings first.
pub async fn start_relay_with(
    api_key: Option<&str>,
    configure: impl FnOnce(&mut Settings),
) -> TestRelay {
    let upstream_addr = serve(mock_upstream()).await;
    let upstream_url = format!("http://{}", upstream_addr);

    let mut settings = Settings {
        api_key: api_key.map(str::to_string),
        internal_api_url: format!("{}/api", upstream_url),
        geocoding_url: format!("{}/geo", upstream_url),
        geocoding_api_key: Some("geo-key".to_string()),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        upstream_timeout_seconds: 5,
        max_upload_bytes: 64 * 1024,
        ..Settings::default()
    };
    configure(&mut settings);

    let state = AppState::from_settings(settings).expect("state");
    let addr = serve(create_app(state.clone())).await;

    TestRelay {
        base_url: format!("http://{}", addr),
        addr,
        upstream_url,
        state,
    }
}

/// Relay whose internal API points at a closed port.
pub async fn start_relay_with_dead_upstream() -> TestRelay {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let dead = listener.local_addr().expect("addr");
    drop(listener);

    let settings = Settings {
        api_key: Some(TEST_API_KEY.to_string()),
        internal_api_url: format!("http://{}/api", dead),
        geocoding_url: format!("http://{}", dead),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        upstream_timeout_seconds: 2,
        ..Settings::default()
    };

    let state = AppState::from_settings(settings).expect("state");
    let addr = serve(create_app(state.clone())).await;

    TestRelay {
        base_url: format!("http://{}", addr),
        addr,
        upstream_url: format!("http://{}", dead),
        state,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().build().expect("reqwest client")
}

fn header_str(headers: &HeaderMap, name: &str) -> Value {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

/// Routes standing in for the internal API and the geocoder.
pub fn mock_upstream() -> Router {
    Router::new()
        .route("/api/echo", any(echo))
        .route("/api/login", post(login))
        .route("/api/bookings", post(create_booking))
        .route("/api/text", get(plain_text))
        .route("/api/reviews/summary", get(compressible))
        .route("/api/missing", get(missing))
        .route("/api/upload", post(upload))
        .route("/api/files/:id/download", get(download))
        .route("/geo/reverse", get(geocode))
        .route("/geo/search", get(geocode))
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": {
            "x-api-key": header_str(&headers, "x-api-key"),
            "cookie": header_str(&headers, "cookie"),
            "accept-language": header_str(&headers, "accept-language"),
            "x-request-id": header_str(&headers, "x-request-id"),
            "content-type": header_str(&headers, "content-type"),
            "accept-encoding": header_str(&headers, "accept-encoding"),
        },
        "requestIdCount": headers.get_all("x-request-id").iter().count(),
        "body": body,
    }))
}

async fn login() -> Response {
    let mut response = Json(json!({"user": {"id": "u-1", "role": "customer"}})).into_response();
    let headers = response.headers_mut();
    headers.append(
        header::SET_COOKIE,
        "session=abc123; Path=/; HttpOnly; SameSite=Lax".parse().unwrap(),
    );
    headers.append(header::SET_COOKIE, "theme=dark; Path=/".parse().unwrap());
    response
}

async fn create_booking(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "bk-1001",
            "status": "pending",
            "service": body["service"],
            "slots": [{"start": "2026-10-20T09:00:00Z", "hours": 2.5}],
            "notes": null
        })),
    )
}

async fn plain_text() -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "pong from upstream").into_response()
}

pub const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b, 0x08, 0x00];

/// Answers with gzip bytes whenever the caller accepts gzip.
async fn compressible(headers: HeaderMap) -> Response {
    let accepts_gzip = headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.contains("gzip"));
    if accepts_gzip {
        return (
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CONTENT_ENCODING, "gzip"),
            ],
            GZIP_MAGIC,
        )
            .into_response();
    }
    Json(json!({"average": 4.8, "count": 132})).into_response()
}

async fn missing() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Review not found"})))
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Json<Value> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("field") {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.expect("bytes");
        let text = match file_name {
            None => Value::String(String::from_utf8_lossy(&data).into_owned()),
            Some(_) => Value::Null,
        };
        fields.push(json!({
            "name": name,
            "fileName": file_name,
            "contentType": content_type,
            "size": data.len(),
            "text": text,
        }));
    }
    Json(json!({
        "apiKey": header_str(&headers, "x-api-key"),
        "cookie": header_str(&headers, "cookie"),
        "fields": fields,
    }))
}

pub const INVOICE_BYTES: &[u8] = b"%PDF-1.4 fake invoice bytes";

async fn download(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if headers.get("x-api-key").is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id != "inv-42" {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "File not found"}))).into_response();
    }
    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"invoice-42.pdf\""),
        ],
        INVOICE_BYTES,
    )
        .into_response()
}

async fn geocode(uri: Uri, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({"endpoint": uri.path(), "params": params}))
}
