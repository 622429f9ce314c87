//! Domain types and DTOs
//!
//! Request and event shapes understood by the relay. Marketplace records
//! (bookings, reviews, services, ...) pass through as opaque JSON and have no
//! types here.

pub mod navigation;
pub mod notifications;
pub mod proxy;
pub mod realtime;

pub use navigation::{Coordinates, ForwardQuery, ReverseQuery};
pub use notifications::{Notification, NotificationType, PushNotificationRequest};
pub use proxy::{ProxyRequest, UploadForm, UploadPart};
pub use realtime::{ClientEvent, WsEvent};
