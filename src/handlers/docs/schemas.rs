// OpenAPI schema definitions

use serde_json::json;
use utoipa::OpenApi;

use crate::models::tenant::{
    CreateTenantRequest, LaunchResponse, SlugAvailabilityResponse, TenantKeysInput,
    TenantProjection,
};
use crate::models::tenant_job::{JobStatusResponse, JobStep, StepStatus};
use crate::models::tenant_key::KeyKind;
use crate::services::flags::{PropagateFlagsRequest, PropagateFlagsResponse};
use crate::services::key_validation::{KeyValidationResult, ValidateKeyRequest};

/// Define utoipa OpenAPI document for the tenant surface
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::tenants::create_tenant,
        crate::handlers::tenants::get_job_status,
        crate::handlers::tenants::check_slug,
        crate::handlers::tenants::validate_tenant_key,
        crate::handlers::flags::propagate_feature_flags,
    ),
    components(
        schemas(
            CreateTenantRequest,
            TenantKeysInput,
            LaunchResponse,
            SlugAvailabilityResponse,
            TenantProjection,
            JobStatusResponse,
            JobStep,
            StepStatus,
            KeyKind,
            ValidateKeyRequest,
            KeyValidationResult,
            PropagateFlagsRequest,
            PropagateFlagsResponse,
        )
    ),
    tags(
        (name = "Tenants", description = "Tenant launch and lifecycle endpoints"),
        (name = "Admin", description = "Platform administration endpoints")
    )
)]
struct TenantApiDoc;

/// Return all schema definitions including utoipa-generated ones
pub fn all_schemas() -> serde_json::Value {
    let mut schemas = json!({
        "LaunchErrorResponse": launch_error_schema(),
    });

    // Merge utoipa-generated schemas for the tenant surface
    let openapi = TenantApiDoc::openapi();
    if let Some(components) = openapi.components {
        if let serde_json::Value::Object(ref mut map) = schemas {
            for (key, schema) in components.schemas {
                map.insert(key, serde_json::to_value(schema).unwrap_or_default());
            }
        }
    }

    schemas
}

/// Uniform error envelope returned by every non-2xx response
fn launch_error_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["error", "code"],
        "properties": {
            "error": {
                "type": "string",
                "description": "Human-readable error message"
            },
            "code": {
                "type": "string",
                "description": "Stable machine-readable error code",
                "example": "SLUG_TAKEN"
            },
            "details": {
                "type": "object",
                "nullable": true,
                "description": "Error-specific detail, e.g. retry_after for rate limits"
            }
        }
    })
}
