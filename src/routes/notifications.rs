//! Server-side push routes
//!
//! Called by the internal API when a domain event (booking status change,
//! new review, ...) should reach connected browsers. Guarded by the same
//! server-held API key the relay injects.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::domain::notifications::{Notification, PushNotificationRequest, PushNotificationResponse};
use crate::domain::realtime::{events, WsEvent};
use crate::error::{ApiError, ApiResult};
use crate::services::upstream::API_KEY_HEADER;

#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub users: Vec<String>,
    pub connections: usize,
}

/// POST /api/notifications/push
pub async fn push_notification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<PushNotificationRequest>, JsonRejection>,
) -> ApiResult<Json<PushNotificationResponse>> {
    require_service_key(&state, &headers)?;

    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let recipients = req.recipients();
    if recipients.is_empty() {
        return Err(ApiError::bad_request("userId or userIds is required"));
    }

    let event_name = req
        .event
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| events::NEW_NOTIFICATION.to_string());
    let notification = Notification::from(req.notification);
    let data = serde_json::to_value(&notification).map_err(|e| ApiError::Internal(e.into()))?;

    let delivered = state
        .hub
        .emit_to_users(&recipients, &WsEvent::new(event_name.clone(), data));

    tracing::info!(
        event = %event_name,
        notification_id = %notification.id,
        notification_type = %notification.notification_type,
        recipients = recipients.len(),
        delivered,
        "Notification pushed"
    );

    Ok(Json(PushNotificationResponse {
        delivered,
        recipients: recipients.len(),
    }))
}

/// GET /api/realtime/online
pub async fn online_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<OnlineUsersResponse>> {
    require_service_key(&state, &headers)?;

    Ok(Json(OnlineUsersResponse {
        users: state.hub.online_users(),
        connections: state.hub.connection_count(),
    }))
}

fn require_service_key(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let expected = state.upstream.ensure_configured()?;

    match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(ApiError::unauthorized("Invalid API key")),
        None => Err(ApiError::unauthorized("Missing API key")),
    }
}
