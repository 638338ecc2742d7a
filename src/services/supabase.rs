// Managed-database provisioning for Tessera Backend (TES-75)
// Stands up one isolated Supabase project per tenant via the management API

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::CONFIG;

/// Tenant schema scripts applied in order during the launch pipeline.
/// The name of the last applied script is recorded on the tenant row as its
/// schema version watermark.
pub const TENANT_MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_site_config",
        include_str!("../../migrations/tenant/0001_site_config.sql"),
    ),
    (
        "0002_content",
        include_str!("../../migrations/tenant/0002_content.sql"),
    ),
    (
        "0003_members",
        include_str!("../../migrations/tenant/0003_members.sql"),
    ),
];

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("Provisioning API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Migration '{script}' failed: {message}")]
    Migration { script: String, message: String },

    #[error("Seed write failed: {0}")]
    Seed(String),
}

// =============================================================================
// DATA STRUCTURES
// =============================================================================

/// Everything produced by standing up a tenant database
#[derive(Debug, Clone)]
pub struct ProvisionedDatabase {
    pub project_ref: String,
    pub api_url: String,
    pub anon_key: String,
    pub service_role_key: String,
    pub database_url: String,
}

/// Initial row written into the tenant's `site_config` table
#[derive(Debug, Clone, Serialize)]
pub struct TenantSeed {
    pub site_name: String,
    pub template: String,
    pub theme: String,
    pub admin_email: String,
    pub feature_flags: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CreateProjectResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiKeyEntry {
    name: String,
    api_key: String,
}

// =============================================================================
// PROVISIONER CLIENT
// =============================================================================

pub struct SupabaseProvisioner {
    client: reqwest::Client,
    api_url: String,
    access_token: String,
    org_id: String,
    region: String,
    project_api_base: Option<String>,
}

impl SupabaseProvisioner {
    pub fn new(
        api_url: String,
        access_token: String,
        org_id: String,
        region: String,
        request_timeout: u64,
        project_api_base: Option<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .user_agent("Tessera-Provisioner/1.0")
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url,
            access_token,
            org_id,
            region,
            project_api_base,
        }
    }

    /// Build from the global configuration
    pub fn from_env() -> Self {
        let config = &CONFIG.supabase;
        Self::new(
            config.api_url.clone(),
            config.access_token.clone(),
            config.org_id.clone(),
            config.region.clone(),
            config.request_timeout,
            config.project_api_base.clone(),
        )
    }

    /// Per-project data API origin. Production derives it from the project
    /// ref; `project_api_base` reroutes it for local development.
    fn project_api_url(&self, project_ref: &str) -> String {
        match &self.project_api_base {
            Some(base) => format!("{}/projects/{}", base.trim_end_matches('/'), project_ref),
            None => format!("https://{}.supabase.co", project_ref),
        }
    }

    /// Create an isolated database project for a tenant.
    ///
    /// Generates the database password locally so the connection string can be
    /// assembled without a second round trip, then fetches the project's data
    /// API keys.
    #[instrument(skip(self))]
    pub async fn create_database(
        &self,
        slug: &str,
    ) -> Result<ProvisionedDatabase, ProvisionerError> {
        let db_pass: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        let body = json!({
            "organization_id": self.org_id,
            "name": format!("tenant-{}", slug),
            "region": self.region,
            "db_pass": db_pass,
        });

        let response = self
            .client
            .post(format!("{}/v1/projects", self.api_url))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)
            .send()
            .await?;

        let project: CreateProjectResponse = Self::read_json(response, "project creation").await?;
        let project_ref = project.id;
        info!("Created tenant project {}", project_ref);

        let (anon_key, service_role_key) = self.fetch_api_keys(&project_ref).await?;

        let api_url = self.project_api_url(&project_ref);
        let database_url = format!(
            "postgresql://postgres:{}@db.{}.supabase.co:5432/postgres",
            db_pass, project_ref
        );

        Ok(ProvisionedDatabase {
            project_ref,
            api_url,
            anon_key,
            service_role_key,
            database_url,
        })
    }

    async fn fetch_api_keys(&self, project_ref: &str) -> Result<(String, String), ProvisionerError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/projects/{}/api-keys",
                self.api_url, project_ref
            ))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await?;

        let entries: Vec<ApiKeyEntry> = Self::read_json(response, "api key listing").await?;

        let mut anon_key = None;
        let mut service_role_key = None;
        for entry in entries {
            match entry.name.as_str() {
                "anon" => anon_key = Some(entry.api_key),
                "service_role" => service_role_key = Some(entry.api_key),
                _ => {},
            }
        }

        match (anon_key, service_role_key) {
            (Some(anon), Some(service)) => Ok((anon, service)),
            _ => Err(ProvisionerError::Api(format!(
                "project {} did not return both anon and service_role keys",
                project_ref
            ))),
        }
    }

    /// Apply the embedded tenant schema scripts in order.
    ///
    /// Stops at the first failing script. The returned name is the last script
    /// that ran and becomes the tenant's recorded schema version.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self, project_ref: &str) -> Result<String, ProvisionerError> {
        let mut applied = None;

        for (name, sql) in TENANT_MIGRATIONS {
            let response = self
                .client
                .post(format!(
                    "{}/v1/projects/{}/database/query",
                    self.api_url, project_ref
                ))
                .header("Authorization", format!("Bearer {}", self.access_token))
                .json(&json!({ "query": sql }))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unreadable body".to_string());
                error!("Migration {} failed with status {}: {}", name, status, body);
                return Err(ProvisionerError::Migration {
                    script: (*name).to_string(),
                    message: format!("status {}: {}", status, body),
                });
            }

            info!("Applied tenant migration {}", name);
            applied = Some((*name).to_string());
        }

        applied.ok_or_else(|| ProvisionerError::Api("no tenant migrations embedded".to_string()))
    }

    /// Write the initial `site_config` row through the tenant's data API.
    /// Structured JSON insert; user-supplied strings never reach a SQL string.
    #[instrument(skip(self, api_url, service_role_key, seed))]
    pub async fn seed_database(
        &self,
        api_url: &str,
        service_role_key: &str,
        seed: &TenantSeed,
    ) -> Result<(), ProvisionerError> {
        let url = format!("{}/rest/v1/site_config", api_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("apikey", service_role_key)
            .header("Authorization", format!("Bearer {}", service_role_key))
            .header("Prefer", "return=minimal")
            .json(seed)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            error!("Seed write failed with status {}: {}", status, body);
            return Err(ProvisionerError::Seed(format!("status {}: {}", status, body)));
        }

        info!("Seeded site_config at {}", url);
        Ok(())
    }

    /// Patch `feature_flags` on a live tenant's `site_config` row.
    ///
    /// `site_config` holds a single row; the `id=gt.0` filter makes the
    /// full-row update explicit for PostgREST.
    #[instrument(skip(self, service_role_key, flags))]
    pub async fn update_feature_flags(
        &self,
        project_ref: &str,
        service_role_key: &str,
        flags: &serde_json::Value,
    ) -> Result<(), ProvisionerError> {
        let url = format!(
            "{}/rest/v1/site_config?id=gt.0",
            self.project_api_url(project_ref)
        );

        let response = self
            .client
            .patch(&url)
            .header("apikey", service_role_key)
            .header("Authorization", format!("Bearer {}", service_role_key))
            .header("Prefer", "return=minimal")
            .json(&json!({ "feature_flags": flags }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            error!(
                "Flag propagation to {} failed with status {}: {}",
                project_ref, status, body
            );
            return Err(ProvisionerError::Api(format!(
                "flag update returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ProvisionerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            error!("{} failed with status {}: {}", what, status, body);
            return Err(ProvisionerError::Api(format!(
                "{} returned {}: {}",
                what, status, body
            )));
        }

        Ok(response.json::<T>().await?)
    }
}
