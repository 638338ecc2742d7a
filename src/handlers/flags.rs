// TES-82: Platform Feature Flag Administration
// Additive rollout of new flag defaults across the fleet

use axum::{
    extract::{Extension, State},
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    services::flags::{FlagService, PropagateFlagsRequest},
    utils::launch_errors::LaunchError,
};

/// Propagate new feature-flag defaults to tenants that lack them
/// POST /v1/admin/feature-flags
#[utoipa::path(
    post,
    path = "/v1/admin/feature-flags",
    tag = "Admin",
    operation_id = "propagateFeatureFlags",
    request_body = PropagateFlagsRequest,
    responses(
        (status = 200, description = "Propagation summary", body = PropagateFlagsResponse),
        (status = 400, description = "Bad request - invalid flag payload"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Forbidden - platform administrator scope required")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn propagate_feature_flags(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Json(request): Json<PropagateFlagsRequest>,
) -> impl IntoResponse {
    if !auth_user.is_platform_admin() {
        return LaunchError::Forbidden("Platform administrator scope required".to_string())
            .into_response();
    }

    let mut conn = match state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(e) => return LaunchError::DatabaseError(e.to_string()).into_response(),
    };

    match FlagService::propagate(&mut conn, &state.vault, &state.provisioner, &request).await {
        Ok(response) => {
            info!(
                "Flag propagation by {} updated {} tenants",
                auth_user.user_id, response.tenants_updated
            );
            Json(response).into_response()
        },
        Err(e) => LaunchError::from(e).into_response(),
    }
}
