// API Documentation handlers - modular structure
pub mod admin;
pub mod health;
pub mod schemas;
pub mod swagger_ui;
pub mod tenants;

use axum::{
    extract::OriginalUri,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{self, json};

use crate::app_config::AppConfig;

/// Serve OpenAPI JSON specification at /v1/docs/openapi.json
pub async fn serve_openapi_spec() -> Response {
    let spec = build_openapi_spec(crate::app_config::config());

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::to_string(&spec).unwrap_or_default(),
    )
        .into_response()
}

/// Redirect /docs to /docs/ for proper relative path resolution
pub async fn redirect_to_docs(original_uri: OriginalUri) -> impl IntoResponse {
    let mut path = original_uri.0.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, path)]).into_response()
}

/// Re-export swagger UI handler
pub use swagger_ui::serve_swagger_ui;

/// Build the complete OpenAPI specification
pub fn build_openapi_spec(config: &AppConfig) -> serde_json::Value {
    let api_url = std::env::var("PUBLIC_API_URL").unwrap_or_else(|_| {
        match config.environment {
            crate::app_config::Environment::Production => "https://api.tessera.site".to_string(),
            crate::app_config::Environment::Staging => {
                "https://api.staging.tessera.site".to_string()
            },
            _ => format!("http://localhost:{}", config.server.api_port),
        }
    });

    let mut servers = vec![json!({
        "url": api_url,
        "description": format!("Current server ({})", config.environment)
    })];

    if !config.is_production() {
        servers.push(json!({
            "url": "https://api.tessera.site",
            "description": "Production server"
        }));
    }

    serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Tessera Platform API",
            "description": "Multi-tenant provisioning API: tenant launches, job polling, slug availability, credential validation, and fleet-wide feature-flag rollout",
            "version": "1.0.0",
            "contact": {
                "name": "Tessera Platform Team",
                "email": "dev@tessera.site"
            }
        },
        "servers": servers,
        "tags": [
            {
                "name": "Tenants",
                "description": "Tenant launch, job polling, slug availability, and key validation"
            },
            {
                "name": "Admin",
                "description": "Platform-wide administration (platform:admin scope)"
            },
            {
                "name": "Health",
                "description": "Service health checks"
            }
        ],
        "paths": {
            "/v1/tenants": tenants::create_tenant_endpoint(),
            "/v1/tenants/jobs/{job_id}": tenants::job_status_endpoint(),
            "/v1/tenants/check-slug/{slug}": tenants::check_slug_endpoint(),
            "/v1/tenants/{tenant_id}/keys/validate": tenants::validate_key_endpoint(),
            "/v1/admin/feature-flags": admin::propagate_flags_endpoint(),
            "/v1/health": health::health_endpoint(),
        },
        "components": {
            "schemas": merge_schemas(),
            "securitySchemes": {
                "bearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT",
                    "description": "JWT access token issued by the identity service"
                }
            }
        }
    })
}

/// Merge all schemas into a single JSON object
pub fn merge_schemas() -> serde_json::Value {
    schemas::all_schemas()
}
