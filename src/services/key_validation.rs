// TES-76: External credential validation
// Per-kind opaque checks against the issuing provider; storage never validates

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use utoipa::ToSchema;
use validator::Validate;
use tracing::{instrument, warn};

use crate::models::tenant_key::KeyKind;

const DEFAULT_MAPS_API_BASE: &str = "https://maps.googleapis.com";
const DEFAULT_AI_API_BASE: &str = "https://api.openai.com";
const DEFAULT_EMAIL_API_BASE: &str = "https://api.resend.com";
const DEFAULT_UPSTREAM_API_BASE: &str = "https://upstream.tessera.site";

// =============================================================================
// DATA STRUCTURES
// =============================================================================

/// Request body for the explicit validation endpoint
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ValidateKeyRequest {
    pub kind: KeyKind,

    #[validate(length(min = 1, max = 512, message = "Key value must be 1-512 characters"))]
    pub value: String,
}

/// Uniform validator outcome. There is no error channel on purpose: a
/// provider outage is reported as `valid: false` with the reason in
/// `message`/`details`, never as a 5xx from our own API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KeyValidationResult {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl KeyValidationResult {
    fn accepted(message: &str) -> Self {
        Self {
            valid: true,
            message: message.to_string(),
            details: None,
        }
    }

    fn rejected(message: &str, details: Option<serde_json::Value>) -> Self {
        Self {
            valid: false,
            message: message.to_string(),
            details,
        }
    }

    fn unreachable(provider: &str, err: &reqwest::Error) -> Self {
        warn!("{} unreachable during key validation: {}", provider, err);
        Self {
            valid: false,
            message: format!("{} could not be reached for validation", provider),
            details: Some(json!({ "network_error": err.to_string() })),
        }
    }
}

// =============================================================================
// KEY VALIDATION SERVICE
// =============================================================================

pub struct KeyValidationService {
    client: reqwest::Client,
    maps_api_base: String,
    ai_api_base: String,
    email_api_base: String,
    upstream_api_base: String,
}

impl Default for KeyValidationService {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAPS_API_BASE.to_string(),
            DEFAULT_AI_API_BASE.to_string(),
            DEFAULT_EMAIL_API_BASE.to_string(),
            DEFAULT_UPSTREAM_API_BASE.to_string(),
            15,
        )
    }
}

impl KeyValidationService {
    pub fn new(
        maps_api_base: String,
        ai_api_base: String,
        email_api_base: String,
        upstream_api_base: String,
        request_timeout: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .user_agent("Tessera-KeyValidator/1.0")
            .build()
            .unwrap_or_default();

        Self {
            client,
            maps_api_base,
            ai_api_base,
            email_api_base,
            upstream_api_base,
        }
    }

    /// Run the external check for one credential kind.
    ///
    /// Platform-managed kinds are refused without any external call; they are
    /// issued during provisioning and have no validator.
    #[instrument(skip(self, value))]
    pub async fn validate(&self, kind: KeyKind, value: &str) -> KeyValidationResult {
        if kind.is_platform_managed() {
            return KeyValidationResult::rejected(
                "This credential is issued by the platform during provisioning and has no external validator",
                None,
            );
        }

        match kind {
            KeyKind::MapsApiKey => self.check_maps_key(value).await,
            KeyKind::AiApiKey => self.check_ai_key(value).await,
            KeyKind::EmailApiKey => self.check_email_key(value).await,
            KeyKind::UpstreamApiToken => self.check_upstream_token(value).await,
            // is_platform_managed covered these above
            KeyKind::DatabaseUrl | KeyKind::AnonKey | KeyKind::ServiceRoleKey => {
                KeyValidationResult::rejected("No validator for this credential kind", None)
            },
        }
    }

    /// Geocoding probe; the provider reports key problems in the JSON
    /// `status` field of an otherwise-200 response.
    async fn check_maps_key(&self, value: &str) -> KeyValidationResult {
        let url = format!("{}/maps/api/geocode/json", self.maps_api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("address", "Seattle"), ("key", value)])
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => match res.json::<serde_json::Value>().await {
                Ok(body) => {
                    let status = body["status"].as_str().unwrap_or("UNKNOWN").to_string();
                    if status == "OK" || status == "ZERO_RESULTS" {
                        KeyValidationResult::accepted("Maps API key accepted by provider")
                    } else {
                        KeyValidationResult::rejected(
                            "Maps API key rejected by provider",
                            Some(json!({ "provider_status": status })),
                        )
                    }
                },
                Err(_) => KeyValidationResult::rejected(
                    "Maps API returned an unreadable response",
                    None,
                ),
            },
            Ok(res) => KeyValidationResult::rejected(
                "Maps API check failed",
                Some(json!({ "status": res.status().as_u16() })),
            ),
            Err(e) => KeyValidationResult::unreachable("Maps API", &e),
        }
    }

    /// Model listing requires nothing beyond a working bearer token
    async fn check_ai_key(&self, value: &str) -> KeyValidationResult {
        let url = format!("{}/v1/models", self.ai_api_base);
        self.bearer_probe(&url, value, "AI provider").await
    }

    async fn check_email_key(&self, value: &str) -> KeyValidationResult {
        let url = format!("{}/domains", self.email_api_base);
        self.bearer_probe(&url, value, "Email provider").await
    }

    async fn check_upstream_token(&self, value: &str) -> KeyValidationResult {
        let url = format!("{}/v1/ping", self.upstream_api_base);
        self.bearer_probe(&url, value, "Upstream platform").await
    }

    /// Shared check for providers where an authenticated GET is enough:
    /// 2xx proves the credential, 401/403 disproves it, anything else is a
    /// provider-side condition reported with its status code.
    async fn bearer_probe(&self, url: &str, value: &str, provider: &str) -> KeyValidationResult {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", value))
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => {
                KeyValidationResult::accepted(&format!("{} accepted the credential", provider))
            },
            Ok(res) if res.status().as_u16() == 401 || res.status().as_u16() == 403 => {
                KeyValidationResult::rejected(
                    &format!("{} rejected the credential", provider),
                    Some(json!({ "status": res.status().as_u16() })),
                )
            },
            Ok(res) => KeyValidationResult::rejected(
                &format!("{} returned an unexpected response", provider),
                Some(json!({ "status": res.status().as_u16() })),
            ),
            Err(e) => KeyValidationResult::unreachable(provider, &e),
        }
    }
}
