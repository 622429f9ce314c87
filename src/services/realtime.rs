//! Real-time notification hub
//!
//! Tracks live WebSocket connections per user and routes events to them.
//! A user may hold several connections at once (one per tab or device).
//! Presence events fire on the first connection and after the last one.

use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::realtime::{events, stamp_sender, ClientEvent, WsEvent};

pub type ConnectionId = Uuid;

/// Serialized frames waiting to be written to one socket.
pub type Outbox = UnboundedReceiver<Arc<str>>;

type Connections = HashMap<ConnectionId, UnboundedSender<Arc<str>>>;

#[derive(Clone, Default)]
pub struct NotificationHub {
    users: Arc<RwLock<HashMap<String, Connections>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for `user_id`.
    #[instrument(skip(self))]
    pub fn register(&self, user_id: &str) -> (ConnectionId, Outbox) {
        let (tx, rx) = unbounded_channel();
        let connection_id = Uuid::new_v4();

        let first = {
            let mut users = self.users.write();
            let connections = users.entry(user_id.to_string()).or_default();
            connections.insert(connection_id, tx);
            connections.len() == 1
        };

        info!(%connection_id, first, "Connection registered");

        if first {
            self.broadcast_except(user_id, &WsEvent::user_online(user_id));
        }

        (connection_id, rx)
    }

    /// Drop a connection. Returns true if the user has gone offline.
    #[instrument(skip(self))]
    pub fn unregister(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        let offline = {
            let mut users = self.users.write();
            match users.get_mut(user_id) {
                Some(connections) => {
                    connections.remove(&connection_id);
                    if connections.is_empty() {
                        users.remove(user_id);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        info!(%connection_id, offline, "Connection unregistered");

        if offline {
            self.broadcast_except(user_id, &WsEvent::user_offline(user_id));
        }

        offline
    }

    /// Send to every connection of one user. Returns the number of connections written.
    pub fn emit_to_user(&self, user_id: &str, event: &WsEvent) -> usize {
        let frame: Arc<str> = event.to_frame().into();
        let users = self.users.read();
        users
            .get(user_id)
            .map(|connections| send_all(connections, &frame))
            .unwrap_or(0)
    }

    pub fn emit_to_users(&self, user_ids: &[String], event: &WsEvent) -> usize {
        let frame: Arc<str> = event.to_frame().into();
        let users = self.users.read();
        user_ids
            .iter()
            .filter_map(|id| users.get(id))
            .map(|connections| send_all(connections, &frame))
            .sum()
    }

    /// Send to one specific connection.
    pub fn emit_to_connection(&self, user_id: &str, connection_id: ConnectionId, event: &WsEvent) -> bool {
        let users = self.users.read();
        users
            .get(user_id)
            .and_then(|connections| connections.get(&connection_id))
            .map(|tx| tx.send(event.to_frame().into()).is_ok())
            .unwrap_or(false)
    }

    /// Send to every connected user except `user_id`.
    pub fn broadcast_except(&self, user_id: &str, event: &WsEvent) -> usize {
        let frame: Arc<str> = event.to_frame().into();
        let users = self.users.read();
        let delivered: usize = users
            .iter()
            .filter(|(id, _)| id.as_str() != user_id)
            .map(|(_, connections)| send_all(connections, &frame))
            .sum();
        debug!(event = %event.event, delivered, "Broadcast");
        delivered
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.read().contains_key(user_id)
    }

    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.users.read().keys().cloned().collect();
        users.sort();
        users
    }

    pub fn connection_count(&self) -> usize {
        self.users.read().values().map(HashMap::len).sum()
    }

    /// Route an event sent by a browser. Returns the number of connections written.
    #[instrument(skip(self, event))]
    pub fn dispatch(&self, sender: &str, connection_id: ConnectionId, event: ClientEvent) -> usize {
        match event {
            ClientEvent::Typing { to, data } => {
                self.emit_to_user(&to, &WsEvent::new(events::TYPING, stamp_sender(&data, sender)))
            }
            ClientEvent::UpdateStatus { status } => self.broadcast_except(
                sender,
                &WsEvent::new(events::UPDATE_STATUS, json!({ "userId": sender, "status": status })),
            ),
            ClientEvent::BookingUpdate { recipient_id, data } => self.emit_to_user(
                &recipient_id,
                &WsEvent::new(events::BOOKING_UPDATE, stamp_sender(&data, sender)),
            ),
            ClientEvent::Ping => {
                let pong = WsEvent::new(events::PONG, json!({}));
                usize::from(self.emit_to_connection(sender, connection_id, &pong))
            }
            ClientEvent::Custom { name, to, data } => {
                let event = WsEvent::new(name, stamp_sender(&data, sender));
                match to {
                    Some(to) => self.emit_to_user(&to, &event),
                    None => self.broadcast_except(sender, &event),
                }
            }
        }
    }
}

fn send_all(connections: &Connections, frame: &Arc<str>) -> usize {
    connections
        .iter()
        .filter(|(connection_id, tx)| {
            let sent = tx.send(frame.clone()).is_ok();
            if !sent {
                // The writer is gone; its reader will unregister shortly
                warn!(%connection_id, "Dropped frame for closed connection");
            }
            sent
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(outbox: &mut Outbox) -> serde_json::Value {
        let frame = outbox.try_recv().expect("frame queued");
        serde_json::from_str(&frame).unwrap()
    }

    #[test]
    fn presence_fires_on_first_and_last_connection() {
        let hub = NotificationHub::new();
        let (_, mut alice) = hub.register("alice");

        let (bob_tab1, _bob_rx1) = hub.register("bob");
        assert_eq!(next(&mut alice), json!({"event": "userOnline", "data": {"userId": "bob"}}));

        let (bob_tab2, _bob_rx2) = hub.register("bob");
        assert!(alice.try_recv().is_err(), "second tab must not re-announce");
        assert_eq!(hub.connection_count(), 3);

        assert!(!hub.unregister("bob", bob_tab1));
        assert!(alice.try_recv().is_err());
        assert!(hub.is_online("bob"));

        assert!(hub.unregister("bob", bob_tab2));
        assert_eq!(next(&mut alice), json!({"event": "userOffline", "data": {"userId": "bob"}}));
        assert!(!hub.is_online("bob"));
        assert_eq!(hub.online_users(), vec!["alice"]);
    }

    #[test]
    fn emit_reaches_every_tab() {
        let hub = NotificationHub::new();
        let (_, mut tab1) = hub.register("pro-1");
        let (_, mut tab2) = hub.register("pro-1");

        let delivered = hub.emit_to_user("pro-1", &WsEvent::new("newNotification", json!({"title": "x"})));
        assert_eq!(delivered, 2);
        assert_eq!(next(&mut tab1)["event"], "newNotification");
        assert_eq!(next(&mut tab2)["event"], "newNotification");

        assert_eq!(hub.emit_to_user("nobody", &WsEvent::new("x", json!(null))), 0);
    }

    #[test]
    fn typing_is_stamped_with_sender() {
        let hub = NotificationHub::new();
        let (customer_conn, _customer_rx) = hub.register("customer");
        let (_, mut pro) = hub.register("pro");

        let event = ClientEvent::Typing {
            to: "pro".to_string(),
            data: json!({"to": "pro", "from": "someone-else", "isTyping": true}),
        };
        assert_eq!(hub.dispatch("customer", customer_conn, event), 1);

        let frame = next(&mut pro);
        assert_eq!(frame["event"], "typing");
        assert_eq!(frame["data"]["from"], "customer");
        assert_eq!(frame["data"]["isTyping"], true);
    }

    #[test]
    fn ping_answers_only_the_asking_connection() {
        let hub = NotificationHub::new();
        let (conn_a, mut tab_a) = hub.register("u1");
        let (_, mut tab_b) = hub.register("u1");

        assert_eq!(hub.dispatch("u1", conn_a, ClientEvent::Ping), 1);
        assert_eq!(next(&mut tab_a)["event"], "pong");
        assert!(tab_b.try_recv().is_err());
    }

    #[test]
    fn status_updates_go_to_everyone_else() {
        let hub = NotificationHub::new();
        let (pro_conn, mut pro) = hub.register("pro");
        let (_, mut customer) = hub.register("customer");
        let (_, mut admin) = hub.register("admin");
        let _ = next(&mut pro); // userOnline customer
        let _ = next(&mut pro); // userOnline admin
        let _ = next(&mut customer); // userOnline admin

        let event = ClientEvent::UpdateStatus { status: json!("busy") };
        assert_eq!(hub.dispatch("pro", pro_conn, event), 2);

        let expected = json!({"event": "updateStatus", "data": {"userId": "pro", "status": "busy"}});
        assert_eq!(next(&mut customer), expected);
        assert_eq!(next(&mut admin), expected);
        assert!(pro.try_recv().is_err());
    }

    #[test]
    fn booking_updates_reach_the_recipient_only() {
        let hub = NotificationHub::new();
        let (pro_conn, _pro_rx) = hub.register("pro");
        let (_, mut customer) = hub.register("customer");
        let (_, mut bystander) = hub.register("bystander");
        let _ = next(&mut customer); // userOnline bystander

        let event = ClientEvent::BookingUpdate {
            recipient_id: "customer".to_string(),
            data: json!({"recipientId": "customer", "bookingId": "bk-1", "status": "confirmed"}),
        };
        assert_eq!(hub.dispatch("pro", pro_conn, event), 1);

        let frame = next(&mut customer);
        assert_eq!(frame["event"], "bookingUpdate");
        assert_eq!(frame["data"]["from"], "pro");
        assert_eq!(frame["data"]["bookingId"], "bk-1");
        assert!(bystander.try_recv().is_err());
    }

    #[test]
    fn custom_events_are_targeted_or_broadcast() {
        let hub = NotificationHub::new();
        let (pro_conn, mut pro) = hub.register("pro");
        let (_, mut customer) = hub.register("customer");
        let (_, mut other) = hub.register("other");
        let _ = next(&mut pro);
        let _ = next(&mut pro);
        let _ = next(&mut customer);

        let targeted = ClientEvent::Custom {
            name: "quoteSent".to_string(),
            to: Some("customer".to_string()),
            data: json!({"to": "customer", "amount": 120}),
        };
        assert_eq!(hub.dispatch("pro", pro_conn, targeted), 1);
        let frame = next(&mut customer);
        assert_eq!(frame["event"], "quoteSent");
        assert_eq!(frame["data"]["from"], "pro");
        assert_eq!(frame["data"]["amount"], 120);
        assert!(other.try_recv().is_err());

        let broadcast = ClientEvent::Custom {
            name: "availabilityChanged".to_string(),
            to: None,
            data: json!({"available": false}),
        };
        assert_eq!(hub.dispatch("pro", pro_conn, broadcast), 2);
        assert_eq!(next(&mut customer)["event"], "availabilityChanged");
        assert_eq!(next(&mut other)["data"], json!({"available": false, "from": "pro"}));
        assert!(pro.try_recv().is_err(), "sender does not hear its own broadcast");
    }

    #[test]
    fn closed_receivers_are_not_counted() {
        let hub = NotificationHub::new();
        let (_, rx) = hub.register("u1");
        drop(rx);
        assert_eq!(hub.emit_to_user("u1", &WsEvent::new("x", json!({}))), 0);
    }
}
