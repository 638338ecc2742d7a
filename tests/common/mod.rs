// Common test utilities and helper structs
// Shared across all test files to avoid duplication

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tessera_backend_core::{
    app::AppState,
    config::RateLimitingConfig,
    db::{create_diesel_pool, DieselDatabaseConfig, DieselPool},
    middleware::auth_middleware,
    models::tenant::{NewTenant, Tenant, TenantStatus},
    models::tenant_job::{JobStep, JobType, TenantJob},
    services::{
        DomainRegistrar, EmailService, JobService, JwtService, KeyValidationService,
        RateLimitService, SupabaseProvisioner, VaultService, LAUNCH_STEPS,
    },
    utils::metrics::SharedMetrics,
};
use tower::util::ServiceExt;
use uuid::Uuid;

/// Resolve the database URL for integration tests.
/// Tests that need Postgres call this first and skip when it is absent.
pub fn test_database_url() -> Option<String> {
    dotenv::from_filename(".env.test").ok();
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

/// Fill in configuration the app requires but tests never read back.
/// Must run before the global config is first dereferenced.
fn ensure_test_env() {
    if std::env::var("JWT_ACCESS_SECRET").is_err() {
        std::env::set_var(
            "JWT_ACCESS_SECRET",
            "integration-test-access-secret-0123456789",
        );
    }
    if std::env::var("VAULT_MASTER_KEY").is_err() {
        std::env::set_var("VAULT_MASTER_KEY", "ab".repeat(32));
    }
    if std::env::var("ENVIRONMENT").is_err() {
        std::env::set_var("ENVIRONMENT", "test");
    }
    // Keep pipeline runs short: steps against stub upstreams answer in
    // milliseconds, and the deadline tests sleep past this on purpose
    if std::env::var("LAUNCH_STEP_TIMEOUT_SECS").is_err() {
        std::env::set_var("LAUNCH_STEP_TIMEOUT_SECS", "3");
    }
    // No Resend sandbox in CI; terminal notification emails stay off
    std::env::set_var("LAUNCH_NOTIFY_ADMIN", "false");
}

/// Upstream service endpoints the app talks to during a launch.
///
/// Defaults point at a local port nothing listens on, so any step that
/// reaches out fails immediately with a connection error instead of
/// hanging until the step deadline.
pub struct UpstreamStubs {
    pub supabase_api: String,
    pub project_api_base: Option<String>,
    pub domains_api: String,
    pub validator_api: Option<String>,
}

impl Default for UpstreamStubs {
    fn default() -> Self {
        Self {
            supabase_api: "http://127.0.0.1:9".to_string(),
            project_api_base: Some("http://127.0.0.1:9".to_string()),
            domains_api: "http://127.0.0.1:9".to_string(),
            validator_api: None,
        }
    }
}

/// Bind a stub upstream on an ephemeral port and serve it in the background.
/// Returns the base URL to hand to the service under test.
pub async fn spawn_stub_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub upstream");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            eprintln!("stub upstream stopped: {}", e);
        }
    });
    format!("http://{}", addr)
}

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub diesel_pool: DieselPool,
    pub jwt_service: Arc<JwtService>,
    pub vault: Arc<VaultService>,
    pub metrics: SharedMetrics,
}

impl TestApp {
    /// Send a POST request
    pub fn post(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "POST", uri)
    }

    /// Send a GET request
    pub fn get(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "GET", uri)
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: &'static str,
    uri: String,
    bearer: Option<String>,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &'static str, uri: &str) -> Self {
        Self {
            app,
            method,
            uri: uri.to_string(),
            bearer: None,
            body: None,
        }
    }

    /// Attach a bearer token
    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self
    }

    /// Send the request
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        if let Some(token) = &self.bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match self.body {
            Some(bytes) => builder
                .header("content-type", "application/json")
                .body(Body::from(bytes))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    /// Get status code
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Parse JSON response
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// Get response body as text
    pub async fn text(self) -> String {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }
}

/// Setup test application with stub upstreams that refuse connections
pub async fn setup_test_app() -> Option<TestApp> {
    setup_test_app_with(UpstreamStubs::default(), None).await
}

/// Setup test application against live stub upstream servers
pub async fn setup_test_app_with_upstreams(upstreams: UpstreamStubs) -> Option<TestApp> {
    setup_test_app_with(upstreams, None).await
}

/// Setup test application with all dependencies.
/// Returns None (and the caller skips) when no test database is configured.
pub async fn setup_test_app_with(
    upstreams: UpstreamStubs,
    rate_limits: Option<RateLimitingConfig>,
) -> Option<TestApp> {
    let database_url = match test_database_url() {
        Some(url) => url,
        None => {
            eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL to run this test");
            return None;
        },
    };
    std::env::set_var("DATABASE_URL", &database_url);
    ensure_test_env();

    // Global config loads now, after the test environment is in place
    let config = tessera_backend_core::app_config::config();

    let db_config = DieselDatabaseConfig {
        url: database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(60),
        max_lifetime: Duration::from_secs(600),
        test_on_checkout: true,
    };
    let diesel_pool = match create_diesel_pool(db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("skipping: test database unreachable: {}", e);
            return None;
        },
    };

    let migration_config = tessera_backend_core::migrations::MigrationConfig::default();
    tessera_backend_core::migrations::run_all_migrations(&diesel_pool, migration_config)
        .await
        .expect("test migrations should apply");

    let jwt_service = Arc::new(JwtService::from_env());
    let rate_limiting = rate_limits.unwrap_or_else(RateLimitingConfig::from_env);
    let rate_limit_service = Arc::new(RateLimitService::new(&rate_limiting, true));
    let vault = Arc::new(test_vault());

    let provisioner = Arc::new(SupabaseProvisioner::new(
        upstreams.supabase_api.clone(),
        "sbp_test_token".to_string(),
        "org_test".to_string(),
        "us-east-1".to_string(),
        5,
        upstreams.project_api_base.clone(),
    ));
    let registrar = Arc::new(DomainRegistrar::new(
        upstreams.domains_api.clone(),
        "vc_test_token".to_string(),
        "prj_test".to_string(),
        "tessera.site".to_string(),
        5,
    ));
    let key_validator = Arc::new(match &upstreams.validator_api {
        Some(base) => KeyValidationService::new(
            base.clone(),
            base.clone(),
            base.clone(),
            base.clone(),
            5,
        ),
        None => KeyValidationService::default(),
    });
    let email_service =
        Arc::new(EmailService::new(config.email.clone()).expect("test email service"));
    let metrics = tessera_backend_core::utils::metrics::new_shared_metrics()
        .expect("test metrics registry");

    let app_state = AppState {
        diesel_pool: diesel_pool.clone(),
        jwt_service: jwt_service.clone(),
        rate_limit_service,
        vault: vault.clone(),
        provisioner,
        registrar,
        key_validator,
        email_service,
        metrics: metrics.clone(),
        max_connections: 5,
    };

    // Same layout as the production router: tenant and admin surfaces behind
    // the auth middleware, health and metrics open
    let protected = Router::new()
        .nest("/v1/tenants", tessera_backend_core::handlers::tenant_routes())
        .nest("/v1/admin", tessera_backend_core::handlers::admin_routes())
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ));

    let app = Router::new()
        .merge(protected)
        .route("/v1/health", get(tessera_backend_core::health_check))
        .route("/metrics", get(tessera_backend_core::metrics_handler))
        .with_state(app_state);

    Some(TestApp {
        app,
        diesel_pool,
        jwt_service,
        vault,
        metrics,
    })
}

/// Vault with a fixed test keyring; sealed values never leave the test database
pub fn test_vault() -> VaultService {
    let mut keys = std::collections::HashMap::new();
    keys.insert(1, [0x42u8; 32]);
    VaultService::new(1, keys).expect("test keyring")
}

/// Generate a unique slug for test isolation
pub fn unique_slug(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

/// Generate a unique admin email
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

/// Mint a token for a tenant owner (no platform scopes)
pub fn owner_token(app: &TestApp, email: &str) -> String {
    app.jwt_service
        .generate_access_token(
            &format!("user-{}", Uuid::new_v4().simple()),
            email,
            vec!["tenants:write".to_string()],
        )
        .expect("mint owner token")
}

/// Mint a token carrying the platform administrator scope
pub fn admin_token(app: &TestApp) -> String {
    app.jwt_service
        .generate_access_token(
            &format!("ops-{}", Uuid::new_v4().simple()),
            "ops@tessera.site",
            vec!["platform:admin".to_string()],
        )
        .expect("mint admin token")
}

/// Minimal valid launch request body
pub fn launch_body(slug: &str, admin_email: &str) -> serde_json::Value {
    serde_json::json!({
        "slug": slug,
        "display_name": "Integration Tenant",
        "team_id": Uuid::new_v4(),
        "admin_email": admin_email,
    })
}

/// Insert a tenant row directly, bypassing the launch pipeline
pub async fn insert_tenant(
    pool: &DieselPool,
    slug: &str,
    admin_email: &str,
    status: TenantStatus,
    flags: serde_json::Value,
) -> Tenant {
    let mut conn = pool.get().await.unwrap();
    Tenant::create(
        &mut conn,
        NewTenant {
            team_id: Uuid::new_v4(),
            slug: slug.to_string(),
            display_name: "Integration Tenant".to_string(),
            template: "standard".to_string(),
            theme: "default".to_string(),
            feature_flags: flags,
            status: status.as_str().to_string(),
            admin_email: admin_email.to_string(),
        },
    )
    .await
    .unwrap()
}

/// Insert a launch job with all steps pending, bypassing the orchestrator
pub async fn insert_launch_job(pool: &DieselPool, tenant_id: Uuid) -> TenantJob {
    let mut conn = pool.get().await.unwrap();
    let steps: Vec<JobStep> = LAUNCH_STEPS.iter().map(|name| JobStep::pending(name)).collect();
    JobService::create_job(&mut conn, tenant_id, JobType::Launch, &steps)
        .await
        .unwrap()
}

/// Reload a tenant row
pub async fn fetch_tenant(pool: &DieselPool, id: Uuid) -> Tenant {
    let mut conn = pool.get().await.unwrap();
    Tenant::find_by_id(&mut conn, id).await.unwrap()
}

/// Reload a job row
pub async fn fetch_job(pool: &DieselPool, id: Uuid) -> TenantJob {
    let mut conn = pool.get().await.unwrap();
    TenantJob::find_by_id(&mut conn, id).await.unwrap()
}

/// Poll the job row until the pipeline lands on a terminal status
pub async fn wait_for_terminal_job(pool: &DieselPool, job_id: Uuid, secs: u64) -> TenantJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    loop {
        let job = fetch_job(pool, job_id).await;
        if job.status_enum().is_terminal() {
            return job;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("job {} did not reach a terminal status within {}s", job_id, secs);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
