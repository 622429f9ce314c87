//! Alora relay server.
//!
//! Sits between the marketplace SPA and the services it must not call
//! directly: the internal API (credential injection), the geocoder, and the
//! real-time notification channel.

pub mod app;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;

pub use app::{create_app, AppState};
pub use config::Settings;
