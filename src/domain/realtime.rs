//! Real-time wire format
//!
//! Every frame in either direction is a JSON text frame:
//! `{ "event": "<name>", "data": <json> }`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod events {
    // server -> client
    pub const CONNECT: &str = "connect";
    pub const NEW_NOTIFICATION: &str = "newNotification";
    pub const USER_ONLINE: &str = "userOnline";
    pub const USER_OFFLINE: &str = "userOffline";
    pub const ERROR: &str = "error";
    pub const PONG: &str = "pong";

    // client -> server
    pub const TYPING: &str = "typing";
    pub const UPDATE_STATUS: &str = "updateStatus";
    pub const BOOKING_UPDATE: &str = "bookingUpdate";
    pub const PING: &str = "ping";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WsEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn user_online(user_id: &str) -> Self {
        Self::new(events::USER_ONLINE, json!({ "userId": user_id }))
    }

    pub fn user_offline(user_id: &str) -> Self {
        Self::new(events::USER_OFFLINE, json!({ "userId": user_id }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(events::ERROR, json!({ "message": message.into() }))
    }

    pub fn to_frame(&self) -> String {
        // Value and String fields cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Event received from a browser, after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Typing { to: String, data: Value },
    UpdateStatus { status: Value },
    BookingUpdate { recipient_id: String, data: Value },
    Ping,
    Custom { name: String, to: Option<String>, data: Value },
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Result<Self, String> {
        let event: WsEvent =
            serde_json::from_str(frame).map_err(|_| "Malformed event frame".to_string())?;
        Self::from_event(event)
    }

    pub fn from_event(event: WsEvent) -> Result<Self, String> {
        let WsEvent { event: name, data } = event;
        match name.as_str() {
            "" => Err("Event name is required".to_string()),
            events::TYPING => {
                let to = target(&data, "to").ok_or("typing requires a 'to' user id")?;
                Ok(Self::Typing { to, data })
            }
            events::UPDATE_STATUS => {
                let status = data
                    .get("status")
                    .filter(|s| !s.is_null())
                    .cloned()
                    .ok_or("updateStatus requires a 'status'")?;
                Ok(Self::UpdateStatus { status })
            }
            events::BOOKING_UPDATE => {
                let recipient_id = target(&data, "recipientId")
                    .ok_or("bookingUpdate requires a 'recipientId'")?;
                Ok(Self::BookingUpdate { recipient_id, data })
            }
            events::PING => Ok(Self::Ping),
            // Server-originated names cannot be spoofed by clients
            events::CONNECT
            | events::NEW_NOTIFICATION
            | events::USER_ONLINE
            | events::USER_OFFLINE
            | events::ERROR
            | events::PONG => Err(format!("'{}' is a reserved event", name)),
            _ => {
                let to = target(&data, "to");
                Ok(Self::Custom { name, to, data })
            }
        }
    }
}

/// Reads a user id field. Ids may arrive as strings or numbers.
fn target(data: &Value, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Copy of `data` with `from` overwritten by the authenticated sender.
pub fn stamp_sender(data: &Value, sender: &str) -> Value {
    match data {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert("from".to_string(), Value::String(sender.to_string()));
            Value::Object(map)
        }
        Value::Null => json!({ "from": sender }),
        other => json!({ "from": sender, "payload": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typing_with_numeric_target() {
        let event = ClientEvent::parse(r#"{"event":"typing","data":{"to":42,"isTyping":true}}"#)
            .unwrap();
        match event {
            ClientEvent::Typing { to, data } => {
                assert_eq!(to, "42");
                assert_eq!(data["isTyping"], true);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn booking_update_needs_recipient() {
        let err = ClientEvent::parse(r#"{"event":"bookingUpdate","data":{"bookingId":"b1"}}"#)
            .unwrap_err();
        assert!(err.contains("recipientId"));
    }

    #[test]
    fn reserved_names_are_rejected() {
        assert!(ClientEvent::parse(r#"{"event":"newNotification","data":{}}"#).is_err());
        assert!(ClientEvent::parse(r#"{"event":"userOnline"}"#).is_err());
    }

    #[test]
    fn unknown_events_become_custom() {
        let event =
            ClientEvent::parse(r#"{"event":"quoteSent","data":{"to":"pro-7","amount":120}}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::Custom {
                name: "quoteSent".to_string(),
                to: Some("pro-7".to_string()),
                data: json!({"to": "pro-7", "amount": 120}),
            }
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(ClientEvent::parse("not json").unwrap_err(), "Malformed event frame");
    }

    #[test]
    fn sender_cannot_be_forged() {
        let stamped = stamp_sender(&json!({"from": "admin", "text": "hi"}), "u-9");
        assert_eq!(stamped, json!({"from": "u-9", "text": "hi"}));
        assert_eq!(stamp_sender(&Value::Null, "u-9"), json!({"from": "u-9"}));
        assert_eq!(
            stamp_sender(&json!("raw"), "u-9"),
            json!({"from": "u-9", "payload": "raw"})
        );
    }
}
