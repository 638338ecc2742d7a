// TES-70: Tenant Launch API - Error handling
// Error types for the tenant provisioning surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::tenant::TenantError;
use crate::models::tenant_domain::TenantDomainError;
use crate::models::tenant_job::TenantJobError;
use crate::models::tenant_key::TenantKeyError;
use crate::services::flags::FlagError;
use crate::services::jobs::JobError;
use crate::services::rate_limit::RateLimitError;
use crate::services::registrar::RegistrarError;
use crate::services::vault::VaultError;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Slug already taken: {0}")]
    SlugTaken(String),

    #[error("Slug is reserved: {0}")]
    ReservedSlug(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid key kind: {0}")]
    InvalidKeyKind(String),

    #[error("Rate limit exceeded. Try again in {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Vault error: {0}")]
    VaultError(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    InternalError,

    #[error("Service unavailable")]
    ServiceUnavailable,
}

// =============================================================================
// ERROR CONVERSIONS
// =============================================================================

impl From<TenantError> for LaunchError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound => LaunchError::NotFound,
            TenantError::SlugTaken(slug) => LaunchError::SlugTaken(slug),
            TenantError::Database(e) => LaunchError::DatabaseError(e.to_string()),
            TenantError::Pool(e) => LaunchError::DatabaseError(e),
        }
    }
}

impl From<TenantJobError> for LaunchError {
    fn from(err: TenantJobError) -> Self {
        match err {
            TenantJobError::NotFound => LaunchError::NotFound,
            TenantJobError::Database(e) => LaunchError::DatabaseError(e.to_string()),
            TenantJobError::Steps(_) => LaunchError::InternalError,
        }
    }
}

impl From<TenantKeyError> for LaunchError {
    fn from(err: TenantKeyError) -> Self {
        match err {
            TenantKeyError::NotFound => LaunchError::NotFound,
            TenantKeyError::Database(e) => LaunchError::DatabaseError(e.to_string()),
        }
    }
}

impl From<TenantDomainError> for LaunchError {
    fn from(err: TenantDomainError) -> Self {
        match err {
            TenantDomainError::NotFound => LaunchError::NotFound,
            TenantDomainError::HostnameTaken(host) => LaunchError::InvalidDomain(host),
            TenantDomainError::Database(e) => LaunchError::DatabaseError(e.to_string()),
        }
    }
}

impl From<JobError> for LaunchError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound => LaunchError::NotFound,
            JobError::Database(e) => LaunchError::DatabaseError(e),
            JobError::Pool(e) => LaunchError::DatabaseError(e),
            _ => LaunchError::InternalError,
        }
    }
}

impl From<VaultError> for LaunchError {
    fn from(err: VaultError) -> Self {
        LaunchError::VaultError(err.to_string())
    }
}

impl From<RegistrarError> for LaunchError {
    fn from(err: RegistrarError) -> Self {
        match err {
            RegistrarError::InvalidSlug(reason) => LaunchError::InvalidSlug(reason),
            RegistrarError::ReservedSlug(slug) => LaunchError::ReservedSlug(slug),
            RegistrarError::Database(e) => LaunchError::DatabaseError(e),
            _ => LaunchError::ServiceUnavailable,
        }
    }
}

impl From<FlagError> for LaunchError {
    fn from(err: FlagError) -> Self {
        match err {
            FlagError::InvalidFlag(reason) => LaunchError::BadRequest(reason),
            FlagError::Database(e) => LaunchError::DatabaseError(e),
            FlagError::Pool(e) => LaunchError::DatabaseError(e),
        }
    }
}

impl From<RateLimitError> for LaunchError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::LimitExceeded { retry_after } => {
                LaunchError::RateLimitExceeded { retry_after }
            },
        }
    }
}

impl From<diesel::result::Error> for LaunchError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => LaunchError::NotFound,
            _ => LaunchError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for LaunchError {
    fn from(err: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |e| format!("{}: {}", field, e.message.as_ref().unwrap_or(&e.code)))
            })
            .collect();

        LaunchError::ValidationError(messages.join(", "))
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LaunchErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LaunchError {
    /// Get HTTP status code for error
    pub fn status_code(&self) -> StatusCode {
        match self {
            LaunchError::InvalidSlug(_)
            | LaunchError::InvalidDomain(_)
            | LaunchError::InvalidKeyKind(_)
            | LaunchError::BadRequest(_) => StatusCode::BAD_REQUEST,

            LaunchError::Unauthorized => StatusCode::UNAUTHORIZED,

            LaunchError::Forbidden(_) => StatusCode::FORBIDDEN,

            LaunchError::NotFound => StatusCode::NOT_FOUND,

            LaunchError::SlugTaken(_) | LaunchError::ReservedSlug(_) => StatusCode::CONFLICT,

            LaunchError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,

            LaunchError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,

            LaunchError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API response
    pub fn error_code(&self) -> &'static str {
        match self {
            LaunchError::InvalidSlug(_) => "INVALID_SLUG",
            LaunchError::SlugTaken(_) => "SLUG_TAKEN",
            LaunchError::ReservedSlug(_) => "RESERVED_SLUG",
            LaunchError::InvalidDomain(_) => "INVALID_DOMAIN",
            LaunchError::InvalidKeyKind(_) => "INVALID_KEY_KIND",
            LaunchError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            LaunchError::NotFound => "NOT_FOUND",
            LaunchError::Unauthorized => "UNAUTHORIZED",
            LaunchError::Forbidden(_) => "FORBIDDEN",
            LaunchError::ValidationError(_) => "VALIDATION_ERROR",
            LaunchError::DatabaseError(_) => "DATABASE_ERROR",
            LaunchError::VaultError(_) => "VAULT_ERROR",
            LaunchError::BadRequest(_) => "BAD_REQUEST",
            LaunchError::InternalError => "INTERNAL_ERROR",
            LaunchError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Create error response
    pub fn to_response(&self) -> LaunchErrorResponse {
        let details = match self {
            LaunchError::RateLimitExceeded { retry_after } => {
                Some(serde_json::json!({ "retry_after": retry_after }))
            },
            LaunchError::ValidationError(msg) => {
                Some(serde_json::json!({ "validation_errors": msg }))
            },
            _ => None,
        };

        LaunchErrorResponse {
            error: self.to_string(),
            code: self.error_code().to_string(),
            details,
        }
    }
}

impl IntoResponse for LaunchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_response();

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// RESULT TYPE
// =============================================================================

pub type LaunchResult<T> = Result<T, LaunchError>;

// =============================================================================
// TESTS
// =============================================================================
