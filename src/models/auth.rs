// Authentication models for Tessera Backend (TES-61)
// Claims are issued by the identity service; this crate only validates them.

use serde::{Deserialize, Serialize};

/// Access token claims structure
/// Contains user identification and granted scopes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User ID (subject)
    pub sub: String,

    /// JWT ID (UUID format)
    pub jti: String,

    /// User email address
    pub email: String,

    /// Token scope/permissions (e.g. "tenants:write", "platform:admin")
    pub scope: Vec<String>,

    /// Audience (aud)
    pub aud: String,

    /// Issuer (iss)
    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}

impl AccessTokenClaims {
    /// Create new access token claims
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        token_id: String,
        email: String,
        scope: Vec<String>,
        audience: String,
        issuer: String,
        issued_at: u64,
        expires_at: u64,
    ) -> Self {
        Self {
            sub: user_id,
            jti: token_id,
            email,
            scope,
            aud: audience,
            iss: issuer,
            iat: issued_at,
            exp: expires_at,
        }
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.exp < now
    }

    /// Check whether the token carries a scope
    pub fn has_scope(&self, wanted: &str) -> bool {
        self.scope.iter().any(|s| s == wanted)
    }
}
