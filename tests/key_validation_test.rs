// TES-76: Credential validation tests
// Provider probes against stub APIs, plus the endpoint's ownership and
// never-5xx posture.

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serial_test::serial;
use std::collections::HashMap;
use tessera_backend_core::models::tenant::TenantStatus;
use tessera_backend_core::models::tenant_key::{KeyKind, TenantKey, TenantKeyError};
use tessera_backend_core::services::KeyValidationService;
use uuid::Uuid;

mod common;
use common::{
    insert_tenant, owner_token, setup_test_app_with_upstreams, spawn_stub_upstream, unique_email,
    unique_slug, UpstreamStubs,
};

const GOOD_KEY: &str = "provider-key-good";

fn bearer_verdict(headers: &HeaderMap) -> StatusCode {
    let authorized = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(|h| h == format!("Bearer {}", GOOD_KEY))
        .unwrap_or(false);
    if authorized {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

/// One stub standing in for every provider the validator probes
fn provider_stub() -> Router {
    Router::new()
        .route(
            "/maps/api/geocode/json",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let status = if params.get("key").map(String::as_str) == Some(GOOD_KEY) {
                    "OK"
                } else {
                    "REQUEST_DENIED"
                };
                Json(serde_json::json!({ "status": status, "results": [] }))
            }),
        )
        .route(
            "/v1/models",
            get(|headers: HeaderMap| async move { bearer_verdict(&headers) }),
        )
        .route(
            "/domains",
            get(|headers: HeaderMap| async move { bearer_verdict(&headers) }),
        )
        .route(
            "/v1/ping",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
}

fn stub_validator(base: &str) -> KeyValidationService {
    KeyValidationService::new(
        base.to_string(),
        base.to_string(),
        base.to_string(),
        base.to_string(),
        5,
    )
}

#[tokio::test]
async fn test_maps_key_verdict_comes_from_provider_status() {
    let base = spawn_stub_upstream(provider_stub()).await;
    let validator = stub_validator(&base);

    let good = validator.validate(KeyKind::MapsApiKey, GOOD_KEY).await;
    assert!(good.valid);

    let bad = validator.validate(KeyKind::MapsApiKey, "wrong-key").await;
    assert!(!bad.valid);
    assert_eq!(
        bad.details.as_ref().unwrap()["provider_status"],
        "REQUEST_DENIED"
    );
}

#[tokio::test]
async fn test_bearer_probe_verdicts() {
    let base = spawn_stub_upstream(provider_stub()).await;
    let validator = stub_validator(&base);

    let good = validator.validate(KeyKind::AiApiKey, GOOD_KEY).await;
    assert!(good.valid);

    let bad = validator.validate(KeyKind::EmailApiKey, "wrong-key").await;
    assert!(!bad.valid);
    assert_eq!(bad.details.as_ref().unwrap()["status"], 401);

    // A provider-side 500 is a rejection with the status attached, not an error
    let odd = validator.validate(KeyKind::UpstreamApiToken, GOOD_KEY).await;
    assert!(!odd.valid);
    assert_eq!(odd.details.as_ref().unwrap()["status"], 500);
}

#[tokio::test]
async fn test_unreachable_provider_is_a_rejection() {
    let validator = stub_validator("http://127.0.0.1:9");

    let outcome = validator.validate(KeyKind::AiApiKey, GOOD_KEY).await;
    assert!(!outcome.valid);
    assert!(!outcome.message.is_empty());
}

#[tokio::test]
#[serial]
async fn test_valid_key_gets_its_vault_row_stamped() {
    let base = spawn_stub_upstream(provider_stub()).await;
    let app = match setup_test_app_with_upstreams(UpstreamStubs {
        validator_api: Some(base),
        ..UpstreamStubs::default()
    })
    .await
    {
        Some(app) => app,
        None => return,
    };

    let email = unique_email("owner");
    let tenant = insert_tenant(
        &app.diesel_pool,
        &unique_slug("stamp"),
        &email,
        TenantStatus::Active,
        serde_json::json!({}),
    )
    .await;

    {
        let mut conn = app.diesel_pool.get().await.unwrap();
        app.vault
            .store_keys(
                &mut conn,
                tenant.id,
                vec![(KeyKind::MapsApiKey, GOOD_KEY.to_string())],
            )
            .await
            .unwrap();
        let row = TenantKey::find(&mut conn, tenant.id, KeyKind::MapsApiKey)
            .await
            .unwrap();
        assert!(row.validated_at.is_none());
    }

    let token = owner_token(&app, &email);
    let response = app
        .post(&format!("/v1/tenants/{}/keys/validate", tenant.id))
        .bearer(&token)
        .json(&serde_json::json!({ "kind": "maps_api_key", "value": GOOD_KEY }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["valid"], true);

    let mut conn = app.diesel_pool.get().await.unwrap();
    let row = TenantKey::find(&mut conn, tenant.id, KeyKind::MapsApiKey)
        .await
        .unwrap();
    assert!(row.validated_at.is_some());
}

#[tokio::test]
#[serial]
async fn test_validation_succeeds_without_a_stored_key() {
    let base = spawn_stub_upstream(provider_stub()).await;
    let app = match setup_test_app_with_upstreams(UpstreamStubs {
        validator_api: Some(base),
        ..UpstreamStubs::default()
    })
    .await
    {
        Some(app) => app,
        None => return,
    };

    let email = unique_email("owner");
    let tenant = insert_tenant(
        &app.diesel_pool,
        &unique_slug("nokey"),
        &email,
        TenantStatus::Active,
        serde_json::json!({}),
    )
    .await;

    // Validating a key the tenant never stored is fine; nothing is created
    let token = owner_token(&app, &email);
    let response = app
        .post(&format!("/v1/tenants/{}/keys/validate", tenant.id))
        .bearer(&token)
        .json(&serde_json::json!({ "kind": "ai_api_key", "value": GOOD_KEY }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["valid"], true);

    let mut conn = app.diesel_pool.get().await.unwrap();
    let missing = TenantKey::find(&mut conn, tenant.id, KeyKind::AiApiKey).await;
    assert!(matches!(missing, Err(TenantKeyError::NotFound)));
}

#[tokio::test]
#[serial]
async fn test_platform_managed_kinds_are_refused() {
    let app = match setup_test_app_with_upstreams(UpstreamStubs::default()).await {
        Some(app) => app,
        None => return,
    };

    let email = unique_email("owner");
    let tenant = insert_tenant(
        &app.diesel_pool,
        &unique_slug("mgd"),
        &email,
        TenantStatus::Active,
        serde_json::json!({}),
    )
    .await;

    let token = owner_token(&app, &email);
    let response = app
        .post(&format!("/v1/tenants/{}/keys/validate", tenant.id))
        .bearer(&token)
        .json(&serde_json::json!({ "kind": "service_role_key", "value": "whatever" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["valid"], false);
    assert!(body["message"].as_str().unwrap().contains("no external validator"));
}

#[tokio::test]
#[serial]
async fn test_stranger_cannot_validate_against_another_tenant() {
    let app = match setup_test_app_with_upstreams(UpstreamStubs::default()).await {
        Some(app) => app,
        None => return,
    };

    let tenant = insert_tenant(
        &app.diesel_pool,
        &unique_slug("priv"),
        &unique_email("owner"),
        TenantStatus::Active,
        serde_json::json!({}),
    )
    .await;

    let stranger = owner_token(&app, &unique_email("stranger"));
    let response = app
        .post(&format!("/v1/tenants/{}/keys/validate", tenant.id))
        .bearer(&stranger)
        .json(&serde_json::json!({ "kind": "maps_api_key", "value": "irrelevant" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Unknown tenant reads identically
    let missing = app
        .post(&format!("/v1/tenants/{}/keys/validate", Uuid::new_v4()))
        .bearer(&stranger)
        .json(&serde_json::json!({ "kind": "maps_api_key", "value": "irrelevant" }))
        .send()
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_empty_key_value_fails_validation() {
    let app = match setup_test_app_with_upstreams(UpstreamStubs::default()).await {
        Some(app) => app,
        None => return,
    };

    let email = unique_email("owner");
    let token = owner_token(&app, &email);
    let response = app
        .post(&format!("/v1/tenants/{}/keys/validate", Uuid::new_v4()))
        .bearer(&token)
        .json(&serde_json::json!({ "kind": "maps_api_key", "value": "" }))
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
