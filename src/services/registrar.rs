// TES-73: Domain registration for tenant hostnames
// Fronts the edge provider's project-domains API and composes the slug checks

use diesel_async::AsyncPgConnection;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::models::tenant::{SlugAvailabilityResponse, Tenant};
use crate::utils::slug_validator::SlugValidator;
use crate::CONFIG;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Slug is reserved: {0}")]
    ReservedSlug(String),

    #[error("Domains API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(String),
}

// =============================================================================
// DATA STRUCTURES
// =============================================================================

/// Outcome of registering a hostname with the edge provider.
///
/// `verified` is almost always false at registration time; certificate
/// issuance completes out-of-band and is reflected later via `ssl_status`.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainRegistration {
    pub name: String,
    #[serde(default)]
    pub verified: bool,
}

// =============================================================================
// DOMAIN REGISTRAR
// =============================================================================

pub struct DomainRegistrar {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    project_id: String,
    root_domain: String,
}

impl DomainRegistrar {
    pub fn new(
        api_url: String,
        api_token: String,
        project_id: String,
        root_domain: String,
        request_timeout: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .user_agent("Tessera-Registrar/1.0")
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url,
            api_token,
            project_id,
            root_domain,
        }
    }

    /// Build from the global configuration
    pub fn from_env() -> Self {
        let config = &CONFIG.domains;
        Self::new(
            config.api_url.clone(),
            config.api_token.clone(),
            config.project_id.clone(),
            config.root_domain.clone(),
            config.request_timeout,
        )
    }

    /// Hostname a slug maps to under the platform root domain
    pub fn subdomain_hostname(&self, slug: &str) -> String {
        format!("{}.{}", slug, self.root_domain)
    }

    /// Pure format guard, no I/O. Reserved names get their own variant so the
    /// API can answer 409 instead of 400.
    pub fn validate_slug_format(slug: &str) -> Result<(), RegistrarError> {
        if SlugValidator::is_reserved(slug) {
            return Err(RegistrarError::ReservedSlug(slug.to_string()));
        }

        SlugValidator::validate(slug).map_err(RegistrarError::InvalidSlug)
    }

    /// Register a hostname with the edge provider
    #[instrument(skip(self))]
    pub async fn add_domain(&self, hostname: &str) -> Result<DomainRegistration, RegistrarError> {
        let response = self
            .client
            .post(format!(
                "{}/v10/projects/{}/domains",
                self.api_url, self.project_id
            ))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&json!({ "name": hostname }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            error!(
                "Domain registration for {} failed with status {}: {}",
                hostname, status, body
            );
            return Err(RegistrarError::Api(format!(
                "domain registration returned {}: {}",
                status, body
            )));
        }

        let registration: DomainRegistration = response.json().await?;
        info!(
            "Registered domain {} (verified: {})",
            registration.name, registration.verified
        );
        Ok(registration)
    }

    /// Full slug availability check, cheapest test first: format guard, then
    /// the tenants table, then the edge provider. Short-circuits on the first
    /// negative.
    #[instrument(skip(self, conn))]
    pub async fn check_subdomain_availability(
        &self,
        conn: &mut AsyncPgConnection,
        slug: &str,
    ) -> Result<SlugAvailabilityResponse, RegistrarError> {
        if let Err(reason) = SlugValidator::validate(slug) {
            return Ok(SlugAvailabilityResponse {
                available: false,
                reason: Some(reason),
            });
        }

        let taken = Tenant::slug_exists(conn, slug)
            .await
            .map_err(|e| RegistrarError::Database(e.to_string()))?;
        if taken {
            return Ok(SlugAvailabilityResponse {
                available: false,
                reason: Some(format!("Slug '{}' is already in use", slug)),
            });
        }

        if self.subdomain_taken_at_edge(slug).await? {
            return Ok(SlugAvailabilityResponse {
                available: false,
                reason: Some(format!(
                    "Hostname {} is already registered",
                    self.subdomain_hostname(slug)
                )),
            });
        }

        Ok(SlugAvailabilityResponse {
            available: true,
            reason: None,
        })
    }

    /// A 200 from the provider means the hostname is already attached to the
    /// edge project; 404 means it is free.
    async fn subdomain_taken_at_edge(&self, slug: &str) -> Result<bool, RegistrarError> {
        let hostname = self.subdomain_hostname(slug);

        let response = self
            .client
            .get(format!(
                "{}/v10/projects/{}/domains/{}",
                self.api_url, self.project_id, hostname
            ))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.as_u16() == 404 {
            Ok(false)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            warn!(
                "Edge availability check for {} returned {}: {}",
                hostname, status, body
            );
            Err(RegistrarError::Api(format!(
                "availability check returned {}: {}",
                status, body
            )))
        }
    }
}
