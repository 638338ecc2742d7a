// Tenant Database Model
// TES-71: Tenant provisioning metadata and lifecycle status

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::schema::tenants;

// =============================================================================
// STATUS ENUM
// =============================================================================

/// Tenant lifecycle status
///
/// Only the launch pipeline moves a tenant out of `Provisioning`:
/// to `Active` on success, to `Suspended` on any fatal failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, diesel::expression::AsExpression)]
#[diesel(sql_type = diesel::sql_types::Text)]
pub enum TenantStatus {
    Provisioning,
    Active,
    Suspended,
    Archived,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Archived => "archived",
        }
    }
}

impl FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(TenantStatus::Provisioning),
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "archived" => Ok(TenantStatus::Archived),
            _ => Err(format!("Invalid tenant status: {}", s)),
        }
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for TenantStatus
where
    DB: diesel::backend::Backend,
    String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = String::from_sql(bytes)?;
        Self::from_str(&value).map_err(|e| e.into())
    }
}

impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for TenantStatus
where
    DB: diesel::backend::Backend,
    str: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

// =============================================================================
// DATABASE MODELS
// =============================================================================

/// Tenant database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = tenants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Tenant {
    pub id: Uuid,
    pub team_id: Uuid,
    pub slug: String,
    pub display_name: String,
    pub template: String,
    pub theme: String,
    pub feature_flags: Value,
    pub status: String, // Will convert to enum
    pub admin_email: String,
    pub supabase_project_ref: Option<String>,
    pub schema_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New tenant for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = tenants)]
pub struct NewTenant {
    pub team_id: Uuid,
    pub slug: String,
    pub display_name: String,
    pub template: String,
    pub theme: String,
    pub feature_flags: Value,
    pub status: String,
    pub admin_email: String,
}

/// Tenant update struct
#[derive(Debug, AsChangeset)]
#[diesel(table_name = tenants)]
pub struct TenantUpdate {
    pub status: Option<String>,
    pub supabase_project_ref: Option<Option<String>>,
    pub schema_version: Option<Option<String>>,
    pub feature_flags: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl TenantUpdate {
    /// Changeset touching nothing but `updated_at`
    pub fn empty() -> Self {
        Self {
            status: None,
            supabase_project_ref: None,
            schema_version: None,
            feature_flags: None,
            updated_at: Utc::now(),
        }
    }
}

/// Errors for tenant operations
#[derive(thiserror::Error, Debug)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Tenant not found")]
    NotFound,

    #[error("Slug '{0}' is already taken")]
    SlugTaken(String),

    #[error("Connection pool error")]
    Pool(String),
}

impl Tenant {
    /// Find tenant by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
    ) -> Result<Self, TenantError> {
        use crate::schema::tenants::dsl::*;

        tenants
            .filter(id.eq(tenant_id))
            .first::<Tenant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantError::NotFound,
                _ => TenantError::Database(e),
            })
    }

    /// Find tenant by slug
    pub async fn find_by_slug(
        conn: &mut AsyncPgConnection,
        slug_value: &str,
    ) -> Result<Self, TenantError> {
        use crate::schema::tenants::dsl::*;

        tenants
            .filter(slug.eq(slug_value))
            .first::<Tenant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantError::NotFound,
                _ => TenantError::Database(e),
            })
    }

    /// Check whether a slug is already taken
    pub async fn slug_exists(
        conn: &mut AsyncPgConnection,
        slug_value: &str,
    ) -> Result<bool, TenantError> {
        use crate::schema::tenants::dsl::*;
        use diesel::dsl::count_star;

        let count: i64 = tenants
            .filter(slug.eq(slug_value))
            .select(count_star())
            .first(conn)
            .await
            .map_err(TenantError::Database)?;

        Ok(count > 0)
    }

    /// Create a new tenant
    ///
    /// A unique-violation on the slug index maps to `SlugTaken` so the
    /// conflict survives the availability-check/insert race.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_tenant: NewTenant,
    ) -> Result<Self, TenantError> {
        use crate::schema::tenants::dsl::*;

        let slug_value = new_tenant.slug.clone();

        diesel::insert_into(tenants)
            .values(&new_tenant)
            .get_result::<Tenant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => TenantError::SlugTaken(slug_value),
                _ => TenantError::Database(e),
            })
    }

    /// Update tenant
    pub async fn update(
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
        update: TenantUpdate,
    ) -> Result<Self, TenantError> {
        use crate::schema::tenants::dsl::*;

        diesel::update(tenants.filter(id.eq(tenant_id)))
            .set(&update)
            .get_result::<Tenant>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantError::NotFound,
                _ => TenantError::Database(e),
            })
    }

    /// Record the provisioned database reference on the tenant
    pub async fn record_project_ref(
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
        project_ref: &str,
    ) -> Result<Self, TenantError> {
        let update = TenantUpdate {
            supabase_project_ref: Some(Some(project_ref.to_string())),
            ..TenantUpdate::empty()
        };
        Self::update(conn, tenant_id, update).await
    }

    /// Record the applied schema version watermark
    pub async fn record_schema_version(
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
        version: &str,
    ) -> Result<Self, TenantError> {
        let update = TenantUpdate {
            schema_version: Some(Some(version.to_string())),
            ..TenantUpdate::empty()
        };
        Self::update(conn, tenant_id, update).await
    }

    /// Move the tenant to a new lifecycle status
    pub async fn set_status(
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
        new_status: TenantStatus,
    ) -> Result<Self, TenantError> {
        let update = TenantUpdate {
            status: Some(new_status.as_str().to_string()),
            ..TenantUpdate::empty()
        };
        Self::update(conn, tenant_id, update).await
    }

    /// List every tenant that is not archived (flag propagation scope)
    pub async fn list_unarchived(
        conn: &mut AsyncPgConnection,
    ) -> Result<Vec<Self>, TenantError> {
        use crate::schema::tenants::dsl::*;

        tenants
            .filter(status.ne(TenantStatus::Archived.as_str()))
            .order(created_at.asc())
            .load::<Tenant>(conn)
            .await
            .map_err(TenantError::Database)
    }

    /// Get tenant's status as enum
    pub fn status_enum(&self) -> TenantStatus {
        TenantStatus::from_str(&self.status).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid tenant status '{}' for tenant {}, treating as Suspended: {}",
                self.status,
                self.id,
                e
            );
            TenantStatus::Suspended
        })
    }

    /// Feature flags as a JSON object map (empty map when the column holds
    /// anything that is not an object)
    pub fn flags_object(&self) -> serde_json::Map<String, Value> {
        self.feature_flags
            .as_object()
            .cloned()
            .unwrap_or_default()
    }

    /// Subset of `incoming` flags this tenant does not define yet.
    /// Propagation is additive-only: existing per-tenant values are never
    /// overwritten.
    pub fn missing_flags(
        &self,
        incoming: &serde_json::Map<String, Value>,
    ) -> serde_json::Map<String, Value> {
        let current = self.flags_object();
        incoming
            .iter()
            .filter(|(name, _)| !current.contains_key(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Public site URL for this tenant
    pub fn site_url(&self, root_domain: &str) -> String {
        format!("https://{}.{}", self.slug, root_domain)
    }
}

// =============================================================================
// REQUEST/RESPONSE DTOs
// =============================================================================

lazy_static! {
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$").unwrap();
}

/// User-supplied provider credentials collected by the launch wizard
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TenantKeysInput {
    pub maps_api_key: Option<String>,
    pub ai_api_key: Option<String>,
    pub email_api_key: Option<String>,
    pub upstream_api_token: Option<String>,
}

/// Request to create and launch a new tenant
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "slug": "acme",
    "display_name": "Acme Inc.",
    "template": "standard",
    "theme": "default",
    "team_id": "123e4567-e89b-12d3-a456-426614174000",
    "admin_email": "owner@acme.com",
    "custom_domain": "www.acme.com",
    "feature_flags": {"beta_editor": true},
    "keys": {"maps_api_key": "mk_live_abc123"}
}))]
pub struct CreateTenantRequest {
    #[validate(length(min = 3, max = 30, message = "Slug must be 3-30 characters"))]
    #[validate(regex(
        path = "SLUG_REGEX",
        message = "Slug can only contain lowercase letters, numbers, and interior hyphens"
    ))]
    pub slug: String,

    #[validate(length(min = 1, max = 120, message = "Display name must be 1-120 characters"))]
    pub display_name: String,

    #[validate(length(max = 50, message = "Template must be less than 50 characters"))]
    pub template: Option<String>,

    #[validate(length(max = 50, message = "Theme must be less than 50 characters"))]
    pub theme: Option<String>,

    pub team_id: Uuid,

    #[validate(email(message = "Invalid admin email"))]
    pub admin_email: String,

    #[validate(length(min = 4, max = 255, message = "Custom domain must be 4-255 characters"))]
    pub custom_domain: Option<String>,

    #[serde(default)]
    pub feature_flags: serde_json::Map<String, Value>,

    #[serde(default)]
    pub keys: TenantKeysInput,
}

impl CreateTenantRequest {
    /// Trim and sanitize input fields
    pub fn sanitize(&mut self) {
        self.slug = self.slug.trim().to_lowercase();
        self.display_name = self.display_name.trim().to_string();
        self.admin_email = self.admin_email.trim().to_lowercase();
        self.template = self.template.as_ref().map(|s| s.trim().to_string());
        self.theme = self.theme.as_ref().map(|s| s.trim().to_string());
        self.custom_domain = self
            .custom_domain
            .as_ref()
            .map(|s| s.trim().trim_end_matches('.').to_lowercase());
    }

    /// Validate fields the derive macro cannot express
    pub fn validate_custom(&self) -> Result<(), String> {
        if self.slug.contains("--") {
            return Err("Slug cannot contain consecutive hyphens".to_string());
        }

        for name in self.feature_flags.keys() {
            if name.is_empty() || name.len() > 64 {
                return Err("Feature flag names must be 1-64 characters".to_string());
            }
        }
        for value in self.feature_flags.values() {
            if !value.is_boolean() {
                return Err("Feature flag values must be booleans".to_string());
            }
        }

        if let Some(domain) = &self.custom_domain {
            if !domain.contains('.') || domain.contains(' ') {
                return Err(format!("'{}' is not a valid hostname", domain));
            }
        }

        Ok(())
    }
}

/// Response returned as soon as the tenant and job rows exist
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "tenant_id": "123e4567-e89b-12d3-a456-426614174000",
    "job_id": "223e4567-e89b-12d3-a456-426614174000"
}))]
pub struct LaunchResponse {
    pub tenant_id: Uuid,
    pub job_id: Uuid,
}

/// Projection of the owning tenant embedded in job-poll responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TenantProjection {
    pub slug: String,
    pub status: String,
    pub display_name: String,
    pub site_url: String,
}

impl TenantProjection {
    pub fn from_tenant(tenant: &Tenant, root_domain: &str) -> Self {
        Self {
            slug: tenant.slug.clone(),
            status: tenant.status.clone(),
            display_name: tenant.display_name.clone(),
            site_url: tenant.site_url(root_domain),
        }
    }
}

/// Slug availability response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlugAvailabilityResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tenant(flags: Value) -> Tenant {
        let now = Utc::now();
        Tenant {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            slug: "acme".to_string(),
            display_name: "Acme Inc.".to_string(),
            template: "standard".to_string(),
            theme: "default".to_string(),
            feature_flags: flags,
            status: TenantStatus::Provisioning.as_str().to_string(),
            admin_email: "owner@acme.com".to_string(),
            supabase_project_ref: None,
            schema_version: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(TenantStatus::Provisioning.as_str(), "provisioning");
        assert_eq!(TenantStatus::Active.as_str(), "active");
        assert_eq!(
            TenantStatus::from_str("suspended"),
            Ok(TenantStatus::Suspended)
        );
        assert_eq!(
            TenantStatus::from_str("archived"),
            Ok(TenantStatus::Archived)
        );
        assert!(TenantStatus::from_str("deleted").is_err());
    }

    #[test]
    fn test_invalid_status_falls_back_to_suspended() {
        let mut tenant = sample_tenant(json!({}));
        tenant.status = "garbage".to_string();
        assert_eq!(tenant.status_enum(), TenantStatus::Suspended);
    }

    #[test]
    fn test_missing_flags_never_overwrites() {
        let tenant = sample_tenant(json!({"existing_flag": false}));

        let mut incoming = serde_json::Map::new();
        incoming.insert("existing_flag".to_string(), json!(true));
        incoming.insert("new_flag".to_string(), json!(true));

        let missing = tenant.missing_flags(&incoming);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing.get("new_flag"), Some(&json!(true)));
        assert!(!missing.contains_key("existing_flag"));
    }

    #[test]
    fn test_flags_object_tolerates_non_object_column() {
        let tenant = sample_tenant(json!("not-an-object"));
        assert!(tenant.flags_object().is_empty());
    }

    #[test]
    fn test_site_url() {
        let tenant = sample_tenant(json!({}));
        assert_eq!(tenant.site_url("tessera.site"), "https://acme.tessera.site");
    }

    #[test]
    fn test_sanitize_normalizes_input() {
        let mut request = CreateTenantRequest {
            slug: "  Acme ".to_string(),
            display_name: " Acme Inc. ".to_string(),
            template: None,
            theme: None,
            team_id: Uuid::new_v4(),
            admin_email: "Owner@ACME.com ".to_string(),
            custom_domain: Some("WWW.Acme.com.".to_string()),
            feature_flags: serde_json::Map::new(),
            keys: TenantKeysInput::default(),
        };

        request.sanitize();
        assert_eq!(request.slug, "acme");
        assert_eq!(request.display_name, "Acme Inc.");
        assert_eq!(request.admin_email, "owner@acme.com");
        assert_eq!(request.custom_domain.as_deref(), Some("www.acme.com"));
    }

    #[test]
    fn test_validate_custom_rejects_non_boolean_flags() {
        let mut request = CreateTenantRequest {
            slug: "acme".to_string(),
            display_name: "Acme".to_string(),
            template: None,
            theme: None,
            team_id: Uuid::new_v4(),
            admin_email: "owner@acme.com".to_string(),
            custom_domain: None,
            feature_flags: serde_json::Map::new(),
            keys: TenantKeysInput::default(),
        };
        request
            .feature_flags
            .insert("limit".to_string(), json!(10));

        assert!(request.validate_custom().is_err());
    }

    #[test]
    fn test_validate_custom_rejects_double_hyphen_slug() {
        let request = CreateTenantRequest {
            slug: "ac--me".to_string(),
            display_name: "Acme".to_string(),
            template: None,
            theme: None,
            team_id: Uuid::new_v4(),
            admin_email: "owner@acme.com".to_string(),
            custom_domain: None,
            feature_flags: serde_json::Map::new(),
            keys: TenantKeysInput::default(),
        };

        assert!(request.validate_custom().is_err());
    }
}
