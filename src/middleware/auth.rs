// Authentication middleware for protected routes
// TES-61: Validates bearer tokens and injects AuthenticatedUser into request
// extensions. Tokens are minted by the identity service; this backend only
// validates them.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{app::AppState, utils::launch_errors::LaunchError};

/// Scope that grants cross-tenant administrative access
pub const PLATFORM_ADMIN_SCOPE: &str = "platform:admin";

/// Authenticated caller information extracted from the access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub token_id: String,
    pub email: String,
    pub scope: Vec<String>,
    pub exp: u64,
}

impl AuthenticatedUser {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }

    pub fn is_platform_admin(&self) -> bool {
        self.has_scope(PLATFORM_ADMIN_SCOPE)
    }
}

/// Middleware that validates the bearer token and stashes the caller
/// identity for downstream extractors
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return LaunchError::Unauthorized.into_response();
        },
    };

    match app_state.jwt_service.validate_access_token(token) {
        Ok(claims) => {
            let auth_user = AuthenticatedUser {
                user_id: claims.sub,
                token_id: claims.jti,
                email: claims.email,
                scope: claims.scope,
                exp: claims.exp,
            };

            request.extensions_mut().insert(auth_user);
            next.run(request).await
        },
        Err(e) => {
            tracing::warn!("JWT validation failed: {}", e);
            LaunchError::Unauthorized.into_response()
        },
    }
}

/// Extractor for AuthenticatedUser from request extensions.
/// Handlers behind `auth_middleware` take it as a plain argument.
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| LaunchError::Unauthorized.into_response())
    }
}
