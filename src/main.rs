use std::time::Duration;

use axum::{middleware as axum_middleware, routing::get, Router};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tessera_backend_core::{
    app::AppState, handlers, health_check, initialize_app_state, metrics_handler, middleware,
    CONFIG,
};

// Keyed rate limiter buckets are pruned on a timer, not per request
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera_backend_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    println!("=== STARTING TESSERA BACKEND API ===");
    info!("Starting Tessera Backend API on {}", bind_address);

    // Initialize pools, services, and migrations
    let state = match initialize_app_state().await {
        Ok(state) => {
            println!("✓ Application state initialized successfully");
            info!("Application state initialized successfully");
            state
        },
        Err(e) => {
            println!("✗ Failed to initialize application state: {}", e);
            error!("Failed to initialize application state: {}", e);
            return Err(std::io::Error::other(format!(
                "Initialization failed: {}",
                e
            )));
        },
    };

    spawn_rate_limit_cleanup(state.clone());

    let app = build_router(state);

    println!("Starting HTTP server on {}...", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

fn build_router(state: AppState) -> Router {
    // Everything under /v1/tenants and /v1/admin requires a valid token
    let protected = Router::new()
        .nest("/v1/tenants", handlers::tenant_routes())
        .nest("/v1/admin", handlers::admin_routes())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .merge(protected)
        .route("/v1/health", get(health_check));

    if CONFIG.features.enable_metrics {
        app = app.route("/metrics", get(metrics_handler));
    }

    if CONFIG.features.enable_swagger_ui {
        app = app
            .route("/v1/docs", get(handlers::docs::redirect_to_docs))
            .route("/v1/docs/", get(handlers::docs::serve_swagger_ui))
            .route(
                "/v1/docs/openapi.json",
                get(handlers::docs::serve_openapi_spec),
            );
    }

    app.layer(axum_middleware::from_fn(
        middleware::dynamic_cors_middleware,
    ))
    .with_state(state)
}

fn spawn_rate_limit_cleanup(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            state.rate_limit_service.cleanup();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
