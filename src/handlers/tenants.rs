// TES-71: Tenant Launch API Endpoints
// TES-72: Job polling, TES-74: slug availability, TES-76: key validation

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    app_config::CONFIG,
    middleware::auth::AuthenticatedUser,
    models::tenant::{CreateTenantRequest, LaunchResponse, Tenant, TenantError, TenantProjection},
    models::tenant_job::{JobStatusResponse, TenantJob, TenantJobError},
    models::tenant_key::{TenantKey, TenantKeyError},
    services::key_validation::ValidateKeyRequest,
    services::launcher::LaunchOrchestrator,
    services::registrar::DomainRegistrar,
    utils::launch_errors::LaunchError,
};

// =============================================================================
// TENANT HANDLERS
// =============================================================================

/// Accept a tenant for launch
/// POST /v1/tenants
#[utoipa::path(
    post,
    path = "/v1/tenants",
    tag = "Tenants",
    operation_id = "createTenant",
    request_body = CreateTenantRequest,
    responses(
        (status = 201, description = "Tenant and launch job created", body = LaunchResponse),
        (status = 400, description = "Bad request - malformed slug"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 409, description = "Conflict - slug already taken or reserved"),
        (status = 422, description = "Validation failed"),
        (status = 429, description = "Too many requests - rate limit exceeded")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_tenant(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(mut request): Json<CreateTenantRequest>,
) -> impl IntoResponse {
    request.sanitize();

    // Validate request
    if let Err(e) = request.validate() {
        return LaunchError::from(e).into_response();
    }
    if let Err(reason) = request.validate_custom() {
        return LaunchError::ValidationError(reason).into_response();
    }

    // Per-caller creation throttle
    if let Err(e) = state
        .rate_limit_service
        .check_tenant_creation(&auth_user.user_id)
    {
        return LaunchError::from(e).into_response();
    }

    // Reserved names are a conflict, not a format failure
    if let Err(e) = DomainRegistrar::validate_slug_format(&request.slug) {
        return LaunchError::from(e).into_response();
    }

    let orchestrator = LaunchOrchestrator::new(state.clone());
    let (tenant, job) = match orchestrator.create_launch(&request).await {
        Ok(pair) => pair,
        Err(e) => return e.into_response(),
    };

    info!(
        "Accepted launch of tenant '{}' ({}) as job {}",
        tenant.slug, tenant.id, job.id
    );

    let response = LaunchResponse {
        tenant_id: tenant.id,
        job_id: job.id,
    };

    orchestrator.spawn_pipeline(tenant, job, request.custom_domain, request.keys);

    (StatusCode::CREATED, Json(response)).into_response()
}

/// Poll a launch job
/// GET /v1/tenants/jobs/{job_id}
#[utoipa::path(
    get,
    path = "/v1/tenants/jobs/{job_id}",
    tag = "Tenants",
    operation_id = "getJobStatus",
    params(
        ("job_id" = Uuid, Path, description = "Job ID (UUID)", example = "223e4567-e89b-12d3-a456-426614174000")
    ),
    responses(
        (status = 200, description = "Job status with step detail", body = JobStatusResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Job not found")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return LaunchError::DatabaseError(e.to_string()).into_response(),
    };

    let job = match TenantJob::find_by_id(&mut conn, job_id).await {
        Ok(job) => job,
        Err(TenantJobError::NotFound) => return LaunchError::NotFound.into_response(),
        Err(e) => return LaunchError::DatabaseError(e.to_string()).into_response(),
    };

    let tenant = match Tenant::find_by_id(&mut conn, job.tenant_id).await {
        Ok(tenant) => tenant,
        Err(TenantError::NotFound) => return LaunchError::NotFound.into_response(),
        Err(e) => return LaunchError::DatabaseError(e.to_string()).into_response(),
    };

    // Job existence must not leak: an unauthorized poll reads as not-found
    if !auth_user.is_platform_admin() && !auth_user.email.eq_ignore_ascii_case(&tenant.admin_email)
    {
        return LaunchError::NotFound.into_response();
    }

    let steps = match job.parse_steps() {
        Ok(steps) => steps,
        Err(e) => {
            warn!("Job {} has a corrupt steps payload: {}", job.id, e);
            return LaunchError::InternalError.into_response();
        },
    };

    let projection = TenantProjection::from_tenant(&tenant, &CONFIG.tenant_root_domain);
    Json(JobStatusResponse::from_parts(&job, steps, projection)).into_response()
}

/// Check whether a slug can still be claimed
/// GET /v1/tenants/check-slug/{slug}
#[utoipa::path(
    get,
    path = "/v1/tenants/check-slug/{slug}",
    tag = "Tenants",
    operation_id = "checkSlug",
    params(
        ("slug" = String, Path, description = "Candidate subdomain slug", example = "acme")
    ),
    responses(
        (status = 200, description = "Availability verdict", body = SlugAvailabilityResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 503, description = "Edge registrar unreachable")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn check_slug(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthenticatedUser>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return LaunchError::DatabaseError(e.to_string()).into_response(),
    };

    let slug = slug.trim().to_lowercase();
    match state
        .registrar
        .check_subdomain_availability(&mut conn, &slug)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(e) => LaunchError::from(e).into_response(),
    }
}

/// Validate a tenant-supplied credential against its provider
/// POST /v1/tenants/{tenant_id}/keys/validate
#[utoipa::path(
    post,
    path = "/v1/tenants/{tenant_id}/keys/validate",
    tag = "Tenants",
    operation_id = "validateTenantKey",
    params(
        ("tenant_id" = Uuid, Path, description = "Tenant ID (UUID)", example = "123e4567-e89b-12d3-a456-426614174000")
    ),
    request_body = ValidateKeyRequest,
    responses(
        (status = 200, description = "Validator verdict", body = KeyValidationResult),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 404, description = "Tenant not found"),
        (status = 422, description = "Validation failed"),
        (status = 429, description = "Too many requests - rate limit exceeded")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn validate_tenant_key(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<ValidateKeyRequest>,
) -> impl IntoResponse {
    if let Err(e) = request.validate() {
        return LaunchError::from(e).into_response();
    }

    // Validation probes hit third-party providers; throttle per caller
    if let Err(e) = state
        .rate_limit_service
        .check_key_validation(&auth_user.user_id)
    {
        return LaunchError::from(e).into_response();
    }

    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return LaunchError::DatabaseError(e.to_string()).into_response(),
    };

    let tenant = match Tenant::find_by_id(&mut conn, tenant_id).await {
        Ok(tenant) => tenant,
        Err(TenantError::NotFound) => return LaunchError::NotFound.into_response(),
        Err(e) => return LaunchError::DatabaseError(e.to_string()).into_response(),
    };

    // Same non-leaking posture as the job poll
    if !auth_user.is_platform_admin() && !auth_user.email.eq_ignore_ascii_case(&tenant.admin_email)
    {
        return LaunchError::NotFound.into_response();
    }

    let result = state.key_validator.validate(request.kind, &request.value).await;
    state
        .metrics
        .launch()
        .key_validated(request.kind.as_str(), result.valid);

    // A key that passed gets its vault row stamped. The tenant may not have
    // stored this kind yet; that is not an error.
    if result.valid {
        match TenantKey::mark_validated(&mut conn, tenant_id, request.kind).await {
            Ok(_) | Err(TenantKeyError::NotFound) => {},
            Err(e) => warn!(
                "Stamping validated key for tenant {} failed: {}",
                tenant_id, e
            ),
        }
    }

    Json(result).into_response()
}
