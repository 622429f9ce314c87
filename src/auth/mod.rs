//! Authentication for the real-time channel
//!
//! HTTP relay routes carry the browser cookie through untouched; only the
//! WebSocket handshake is authenticated here.

pub mod claims;
pub mod middleware;
pub mod token;

pub use claims::{AuthContext, Claims, Role};
pub use middleware::{AuthError, RequireAuth};
pub use token::JwtKeys;
