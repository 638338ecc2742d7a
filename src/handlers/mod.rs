// Production handlers only
// TES-71: Tenant launch handlers
// TES-82: Platform flag administration

pub mod docs; // Modular documentation structure
pub mod flags;
pub mod tenants;

use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};

// Tenant surface routes
pub fn tenant_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(tenants::create_tenant))
        .route("/jobs/{job_id}", get(tenants::get_job_status))
        .route("/check-slug/{slug}", get(tenants::check_slug))
        .route(
            "/{tenant_id}/keys/validate",
            post(tenants::validate_tenant_key),
        )
}

// Platform administration routes
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/feature-flags", post(flags::propagate_feature_flags))
}
