// TES-82: Platform feature-flag propagation
// Additive sweep: a flag lands only on tenants that do not define it yet

use diesel_async::AsyncPgConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::models::tenant::{Tenant, TenantError, TenantStatus, TenantUpdate};
use crate::models::tenant_key::KeyKind;
use crate::services::supabase::SupabaseProvisioner;
use crate::services::vault::VaultService;

const MAX_FLAG_NAME_LEN: usize = 64;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("Invalid flag: {0}")]
    InvalidFlag(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),
}

impl From<TenantError> for FlagError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::Pool(e) => FlagError::Pool(e),
            other => FlagError::Database(other.to_string()),
        }
    }
}

// =============================================================================
// REQUEST/RESPONSE DTOs
// =============================================================================

/// Request body for `POST /v1/admin/feature-flags`.
/// Values are booleans by contract; anything else fails deserialization.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PropagateFlagsRequest {
    pub flags: HashMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PropagateFlagsResponse {
    pub tenants_updated: usize,
}

// =============================================================================
// FLAG SERVICE
// =============================================================================

pub struct FlagService;

impl FlagService {
    pub fn validate_flags(flags: &HashMap<String, bool>) -> Result<(), FlagError> {
        if flags.is_empty() {
            return Err(FlagError::InvalidFlag(
                "at least one flag is required".to_string(),
            ));
        }

        for name in flags.keys() {
            if name.is_empty() || name.len() > MAX_FLAG_NAME_LEN {
                return Err(FlagError::InvalidFlag(format!(
                    "flag name '{}' must be 1-{} characters",
                    name, MAX_FLAG_NAME_LEN
                )));
            }
        }

        Ok(())
    }

    /// Sweep every unarchived tenant, adding only the flags it lacks.
    ///
    /// For active, provisioned tenants the runtime copy is patched before the
    /// platform row: a runtime failure leaves the platform row untouched, so
    /// the next sweep retries both writes. Tenants without a provisioned
    /// database get the platform-row update alone.
    #[instrument(skip_all, fields(flag_count = incoming.flags.len()))]
    pub async fn propagate(
        conn: &mut AsyncPgConnection,
        vault: &VaultService,
        provisioner: &SupabaseProvisioner,
        incoming: &PropagateFlagsRequest,
    ) -> Result<PropagateFlagsResponse, FlagError> {
        Self::validate_flags(&incoming.flags)?;

        let incoming_map: serde_json::Map<String, Value> = incoming
            .flags
            .iter()
            .map(|(name, enabled)| (name.clone(), Value::Bool(*enabled)))
            .collect();

        let tenants = Tenant::list_unarchived(conn).await?;
        let mut tenants_updated = 0usize;

        for tenant in tenants {
            let missing = tenant.missing_flags(&incoming_map);
            if missing.is_empty() {
                continue;
            }

            let mut merged = tenant.flags_object();
            for (name, value) in missing {
                merged.insert(name, value);
            }
            let merged = Value::Object(merged);

            if tenant.status_enum() == TenantStatus::Active {
                if let Some(project_ref) = tenant.supabase_project_ref.clone() {
                    let pushed = Self::push_runtime_flags(
                        conn,
                        vault,
                        provisioner,
                        &tenant,
                        &project_ref,
                        &merged,
                    )
                    .await;

                    if let Err(reason) = pushed {
                        warn!("Skipping tenant {} this sweep: {}", tenant.slug, reason);
                        continue;
                    }
                }
            }

            let mut update = TenantUpdate::empty();
            update.feature_flags = Some(merged);
            Tenant::update(conn, tenant.id, update).await?;
            tenants_updated += 1;
        }

        info!("Flag propagation updated {} tenants", tenants_updated);
        Ok(PropagateFlagsResponse { tenants_updated })
    }

    async fn push_runtime_flags(
        conn: &mut AsyncPgConnection,
        vault: &VaultService,
        provisioner: &SupabaseProvisioner,
        tenant: &Tenant,
        project_ref: &str,
        merged: &Value,
    ) -> Result<(), String> {
        let service_role_key = vault
            .fetch_key(conn, tenant.id, KeyKind::ServiceRoleKey)
            .await
            .map_err(|e| format!("service role key unavailable: {}", e))?;

        provisioner
            .update_feature_flags(project_ref, &service_role_key, merged)
            .await
            .map_err(|e| format!("runtime flag update failed: {}", e))
    }
}

// =============================================================================
// TESTS
// =============================================================================
