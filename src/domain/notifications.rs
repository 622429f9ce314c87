//! Notification domain types
//!
//! Payloads pushed to connected browsers over the real-time channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type enum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    // Booking lifecycle
    BookingCreated,
    BookingStatusChanged,
    BookingCancelled,

    // Reviews
    NewReview,
    ReviewResponse,

    // Messaging
    NewMessage,

    // Customer activity on a professional
    FavoriteAdded,

    // Profile/verification
    ProfileVerified,

    // System
    #[serde(other)]
    System,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// Notification as delivered to the browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Notification as submitted by the internal API; ids and timestamps are optional
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<NotificationInput> for Notification {
    fn from(input: NotificationInput) -> Self {
        Self {
            id: input.id.unwrap_or_else(Uuid::new_v4),
            notification_type: input.notification_type,
            title: input.title,
            message: input.message,
            data: input.data.unwrap_or_else(|| serde_json::json!({})),
            created_at: input.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Body of `POST /api/notifications/push`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotificationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_ids: Vec<String>,
    /// Event name on the wire, `newNotification` when omitted
    #[serde(default)]
    pub event: Option<String>,
    pub notification: NotificationInput,
}

impl PushNotificationRequest {
    /// All recipients, deduplicated, in submission order.
    pub fn recipients(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.user_ids.len() + 1);
        for id in self.user_id.iter().chain(self.user_ids.iter()) {
            let id = id.trim();
            if !id.is_empty() && !out.iter().any(|seen| seen == id) {
                out.push(id.to_string());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PushNotificationResponse {
    pub delivered: usize,
    pub recipients: usize,
}
