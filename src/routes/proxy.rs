//! Internal API relay routes
//!
//! The browser never holds the API key. It describes the call it wants and
//! the relay performs it with the key and the browser's cookie attached.

use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Path, State,
    },
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::domain::{ProxyRequest, UploadForm, UploadPart};
use crate::error::{ApiError, ApiResult};
use crate::services::{Forwarded, RelayedResponse};

/// POST /api/proxy-api
///
/// Body: `{ url, method?, body?, headers? }`
pub async fn proxy_api(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> ApiResult<RelayedResponse> {
    // A missing key is a 500 whatever the request looks like
    state.upstream.ensure_configured()?;

    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    tracing::info!(
        url = %request.url,
        method = request.method.as_deref().unwrap_or("GET"),
        "Proxying request"
    );

    state
        .upstream
        .relay(request, &Forwarded::from_headers(&headers))
        .await
}

/// POST /api/proxy-upload
///
/// `multipart/form-data` with a `url` field naming the target path, an
/// optional `method` field, and any number of other fields and files.
pub async fn proxy_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<RelayedResponse> {
    state.upstream.ensure_configured()?;

    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let form = read_upload_form(multipart).await?;

    let url = form
        .url
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("url field is required"))?;

    tracing::info!(
        url = url,
        fields = form.parts.len(),
        files = form.file_count(),
        "Proxying upload"
    );

    state
        .upstream
        .relay_multipart(
            url,
            form.method.as_deref(),
            form.parts,
            &Forwarded::from_headers(&headers),
        )
        .await
}

/// GET /api/file/:id
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    tracing::info!(file_id = %id, "Relaying file download");

    state
        .upstream
        .stream_file(&id, &Forwarded::from_headers(&headers))
        .await
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if name.is_empty() {
            tracing::debug!("Skipping unnamed multipart field");
            continue;
        }

        let Some(file_name) = file_name else {
            let value = field.text().await.map_err(multipart_error)?;
            match name.as_str() {
                "url" => form.url = Some(value),
                "method" => form.method = Some(value),
                _ => form.parts.push(UploadPart::Text { name, value }),
            }
            continue;
        };

        let data = field.bytes().await.map_err(multipart_error)?;
        form.parts.push(UploadPart::File {
            name,
            file_name,
            content_type,
            data,
        });
    }

    Ok(form)
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}
