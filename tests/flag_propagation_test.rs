// TES-82: Feature flag propagation tests
// Additive-only sweeps: existing per-tenant choices are never overwritten,
// and runtime copies are patched before the platform row.

use axum::http::StatusCode;
use axum::routing::patch;
use axum::{Json, Router};
use serde_json::Value;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use tessera_backend_core::models::tenant::{Tenant, TenantStatus};
use tessera_backend_core::models::tenant_key::KeyKind;
use uuid::Uuid;

mod common;
use common::{
    admin_token, fetch_tenant, insert_tenant, owner_token, setup_test_app,
    setup_test_app_with_upstreams, spawn_stub_upstream, unique_email, unique_slug, UpstreamStubs,
};

fn unique_flag(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &id[..8])
}

fn flags_payload(name: &str, enabled: bool) -> Value {
    let mut flags = serde_json::Map::new();
    flags.insert(name.to_string(), Value::Bool(enabled));
    serde_json::json!({ "flags": Value::Object(flags) })
}

fn single_flag(name: &str, enabled: bool) -> Value {
    let mut flags = serde_json::Map::new();
    flags.insert(name.to_string(), Value::Bool(enabled));
    Value::Object(flags)
}

#[tokio::test]
#[serial]
async fn test_propagation_requires_platform_admin() {
    let app = match setup_test_app().await {
        Some(app) => app,
        None => return,
    };

    let token = owner_token(&app, &unique_email("notadmin"));
    let response = app
        .post("/v1/admin/feature-flags")
        .bearer(&token)
        .json(&flags_payload(&unique_flag("beta"), true))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
#[serial]
async fn test_sweep_adds_missing_flags_without_overwriting() {
    let app = match setup_test_app().await {
        Some(app) => app,
        None => return,
    };

    let flag = unique_flag("beta");

    // Lacks the flag entirely: the sweep adds it
    let lacking = insert_tenant(
        &app.diesel_pool,
        &unique_slug("lacks"),
        &unique_email("owner"),
        TenantStatus::Provisioning,
        serde_json::json!({}),
    )
    .await;

    // Opted out already: the sweep must not flip it back on
    let opted_out = insert_tenant(
        &app.diesel_pool,
        &unique_slug("optout"),
        &unique_email("owner"),
        TenantStatus::Provisioning,
        single_flag(&flag, false),
    )
    .await;

    // Suspended tenants still get platform-row defaults
    let suspended = insert_tenant(
        &app.diesel_pool,
        &unique_slug("susp"),
        &unique_email("owner"),
        TenantStatus::Suspended,
        serde_json::json!({}),
    )
    .await;

    // Archived tenants are out of the sweep entirely
    let archived = insert_tenant(
        &app.diesel_pool,
        &unique_slug("arch"),
        &unique_email("owner"),
        TenantStatus::Archived,
        serde_json::json!({}),
    )
    .await;

    let token = admin_token(&app);
    let response = app
        .post("/v1/admin/feature-flags")
        .bearer(&token)
        .json(&flags_payload(&flag, true))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert!(body["tenants_updated"].as_u64().unwrap() >= 2);

    let lacking = fetch_tenant(&app.diesel_pool, lacking.id).await;
    assert_eq!(lacking.flags_object()[&flag], Value::Bool(true));

    let opted_out = fetch_tenant(&app.diesel_pool, opted_out.id).await;
    assert_eq!(opted_out.flags_object()[&flag], Value::Bool(false));

    let suspended = fetch_tenant(&app.diesel_pool, suspended.id).await;
    assert_eq!(suspended.flags_object()[&flag], Value::Bool(true));

    let archived = fetch_tenant(&app.diesel_pool, archived.id).await;
    assert!(archived.flags_object().get(&flag).is_none());
}

#[tokio::test]
#[serial]
async fn test_active_tenant_runtime_copy_is_patched_first() {
    let captured: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let runtime_stub = Router::new().route(
        "/projects/{project_ref}/rest/v1/site_config",
        patch(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(body);
                StatusCode::NO_CONTENT
            }
        }),
    );
    let runtime_base = spawn_stub_upstream(runtime_stub).await;

    let app = match setup_test_app_with_upstreams(UpstreamStubs {
        project_api_base: Some(runtime_base),
        ..UpstreamStubs::default()
    })
    .await
    {
        Some(app) => app,
        None => return,
    };

    let marker = unique_flag("marker");
    let flag = unique_flag("beta");
    let tenant = insert_tenant(
        &app.diesel_pool,
        &unique_slug("live"),
        &unique_email("owner"),
        TenantStatus::Active,
        single_flag(&marker, true),
    )
    .await;

    {
        let mut conn = app.diesel_pool.get().await.unwrap();
        let project_ref = format!("flagref{}", Uuid::new_v4().simple());
        Tenant::record_project_ref(&mut conn, tenant.id, &project_ref)
            .await
            .unwrap();
        app.vault
            .store_keys(
                &mut conn,
                tenant.id,
                vec![(KeyKind::ServiceRoleKey, "service-role-key-test".to_string())],
            )
            .await
            .unwrap();
    }

    let token = admin_token(&app);
    let response = app
        .post("/v1/admin/feature-flags")
        .bearer(&token)
        .json(&flags_payload(&flag, true))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The runtime copy received the merged set, old flags intact
    let bodies = captured.lock().unwrap().clone();
    let ours = bodies
        .iter()
        .find(|body| body["feature_flags"][&marker] == Value::Bool(true))
        .expect("runtime patch for our tenant");
    assert_eq!(ours["feature_flags"][&flag], Value::Bool(true));

    let tenant = fetch_tenant(&app.diesel_pool, tenant.id).await;
    let flags = tenant.flags_object();
    assert_eq!(flags[&marker], Value::Bool(true));
    assert_eq!(flags[&flag], Value::Bool(true));
}

#[tokio::test]
#[serial]
async fn test_unreachable_runtime_skips_tenant_this_sweep() {
    // project_api_base points at a dead port: the runtime patch fails
    let app = match setup_test_app().await {
        Some(app) => app,
        None => return,
    };

    let marker = unique_flag("marker");
    let flag = unique_flag("beta");

    let stuck = insert_tenant(
        &app.diesel_pool,
        &unique_slug("stuck"),
        &unique_email("owner"),
        TenantStatus::Active,
        single_flag(&marker, true),
    )
    .await;
    {
        let mut conn = app.diesel_pool.get().await.unwrap();
        Tenant::record_project_ref(
            &mut conn,
            stuck.id,
            &format!("deadref{}", Uuid::new_v4().simple()),
        )
        .await
        .unwrap();
        app.vault
            .store_keys(
                &mut conn,
                stuck.id,
                vec![(KeyKind::ServiceRoleKey, "service-role-key-test".to_string())],
            )
            .await
            .unwrap();
    }

    let reachable = insert_tenant(
        &app.diesel_pool,
        &unique_slug("fine"),
        &unique_email("owner"),
        TenantStatus::Provisioning,
        serde_json::json!({}),
    )
    .await;

    let token = admin_token(&app);
    let response = app
        .post("/v1/admin/feature-flags")
        .bearer(&token)
        .json(&flags_payload(&flag, true))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Platform row untouched: the next sweep retries both writes
    let stuck = fetch_tenant(&app.diesel_pool, stuck.id).await;
    assert!(stuck.flags_object().get(&flag).is_none());
    assert_eq!(stuck.flags_object()[&marker], Value::Bool(true));

    let reachable = fetch_tenant(&app.diesel_pool, reachable.id).await;
    assert_eq!(reachable.flags_object()[&flag], Value::Bool(true));
}

#[tokio::test]
#[serial]
async fn test_empty_flag_payload_is_a_bad_request() {
    let app = match setup_test_app().await {
        Some(app) => app,
        None => return,
    };

    let token = admin_token(&app);
    let response = app
        .post("/v1/admin/feature-flags")
        .bearer(&token)
        .json(&serde_json::json!({ "flags": {} }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
#[serial]
async fn test_non_boolean_flag_values_are_rejected_at_the_edge() {
    let app = match setup_test_app().await {
        Some(app) => app,
        None => return,
    };

    let token = admin_token(&app);
    let response = app
        .post("/v1/admin/feature-flags")
        .bearer(&token)
        .json(&serde_json::json!({ "flags": { "beta_editor": "on" } }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
