//! Session token payload and the user it identifies

use serde::{Deserialize, Serialize};

/// Marketplace role stamped into session tokens by the internal API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Professional,
    Admin,
    /// Any role this relay does not know about yet
    #[serde(other)]
    Other,
}

/// Claims of a real-time session token.
///
/// Tokens are minted by the internal API with the shared `JWT_SECRET`; the
/// relay only verifies them (tests mint their own).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Authenticated user behind a real-time connection
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl TryFrom<Claims> for AuthContext {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims.sub.trim();
        if user_id.is_empty() {
            return Err("Token has an empty subject");
        }

        Ok(Self {
            user_id: user_id.to_string(),
            email: claims.email,
            role: claims.role,
        })
    }
}
