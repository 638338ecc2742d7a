// Library exports for Tessera Backend
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use config::{RateLimitConfig, RateLimitingConfig};
pub use db::DieselPool;
pub use middleware::auth_middleware;
pub use middleware::AuthenticatedUser;
pub use models::auth::AccessTokenClaims;
pub use services::{
    DomainRegistrar, EmailService, FlagService, JobService, JwtConfig, JwtError, JwtService,
    KeyValidationService, LaunchOrchestrator, RateLimitService, SupabaseProvisioner, VaultService,
};

// Re-export handler route builders
pub use handlers::{admin_routes, tenant_routes};

// Re-export individual handlers for direct use
pub use handlers::flags::propagate_feature_flags;
pub use handlers::tenants::{check_slug, create_tenant, get_job_status, validate_tenant_key};

// Diesel database pool type alias
use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type DbPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

// Library initialization function for external consumers
// This allows the cloud distribution to initialize the core backend services
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use tracing::info;

    // Load environment
    dotenv::dotenv().ok();

    // Initialize config
    let config = app_config::config();

    // Initialize database pool
    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let max_connections = db_config.max_connections;
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    // Run migrations if enabled
    if migrations::should_run_migrations() {
        info!("Running embedded migrations...");
        let migration_config = migrations::MigrationConfig::default();
        migrations::run_all_migrations(&diesel_pool, migration_config)
            .await
            .map_err(|e| format!("Migration failed: {}", e))?;
    }

    // Initialize services
    let rate_limiting = RateLimitingConfig::from_env();
    rate_limiting.validate()?;
    let rate_limit_service = Arc::new(RateLimitService::new(
        &rate_limiting,
        config.features.enable_rate_limiting,
    ));

    let jwt_service = Arc::new(JwtService::from_env());
    let vault = Arc::new(VaultService::from_env()?);
    let provisioner = Arc::new(SupabaseProvisioner::from_env());
    let registrar = Arc::new(DomainRegistrar::from_env());
    let key_validator = Arc::new(KeyValidationService::default());
    let email_service = Arc::new(EmailService::new(config.email.clone())?);
    let metrics = utils::metrics::new_shared_metrics()?;

    // Create app state
    Ok(AppState {
        diesel_pool,
        jwt_service,
        rate_limit_service,
        vault,
        provisioner,
        registrar,
        key_validator,
        email_service,
        metrics,
        max_connections,
    })
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    // Check PostgreSQL
    let postgres_health = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({
            "status": "healthy",
            "max_connections": state.max_connections,
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    let response = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "tessera-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

// Prometheus text exposition
pub async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::response::Response {
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Metrics encoding failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        },
    }
}
