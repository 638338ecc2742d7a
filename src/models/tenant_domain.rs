// Tenant Domain Database Model
// TES-73: Hostnames routed to a tenant and their certificate state

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::schema::tenant_domains;

/// Certificate state for a routed hostname. `Pending` flips to `Active`
/// out-of-band once the SSL service finishes issuance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SslStatus {
    Pending,
    Active,
    Failed,
}

impl SslStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslStatus::Pending => "pending",
            SslStatus::Active => "active",
            SslStatus::Failed => "failed",
        }
    }
}

impl FromStr for SslStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SslStatus::Pending),
            "active" => Ok(SslStatus::Active),
            "failed" => Ok(SslStatus::Failed),
            _ => Err(format!("Invalid SSL status: {}", s)),
        }
    }
}

/// Tenant domain database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = tenant_domains)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TenantDomain {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub hostname: String,
    pub is_primary: bool,
    pub ssl_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New domain row for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = tenant_domains)]
pub struct NewTenantDomain {
    pub tenant_id: Uuid,
    pub hostname: String,
    pub is_primary: bool,
    pub ssl_status: String,
}

#[derive(thiserror::Error, Debug)]
pub enum TenantDomainError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Domain not found")]
    NotFound,

    #[error("Hostname '{0}' is already routed")]
    HostnameTaken(String),
}

impl TenantDomain {
    /// Record a hostname routed to a tenant
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_domain: NewTenantDomain,
    ) -> Result<Self, TenantDomainError> {
        use crate::schema::tenant_domains::dsl::*;

        let hostname_value = new_domain.hostname.clone();

        diesel::insert_into(tenant_domains)
            .values(&new_domain)
            .get_result::<TenantDomain>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => TenantDomainError::HostnameTaken(hostname_value),
                _ => TenantDomainError::Database(e),
            })
    }

    /// All hostnames routed to a tenant, primary first
    pub async fn list_for_tenant(
        conn: &mut AsyncPgConnection,
        tenant: Uuid,
    ) -> Result<Vec<Self>, TenantDomainError> {
        use crate::schema::tenant_domains::dsl::*;

        tenant_domains
            .filter(tenant_id.eq(tenant))
            .order(is_primary.desc())
            .load::<TenantDomain>(conn)
            .await
            .map_err(TenantDomainError::Database)
    }

    /// Check whether a hostname is already routed to any tenant
    pub async fn hostname_exists(
        conn: &mut AsyncPgConnection,
        hostname_value: &str,
    ) -> Result<bool, TenantDomainError> {
        use crate::schema::tenant_domains::dsl::*;
        use diesel::dsl::count_star;

        let count: i64 = tenant_domains
            .filter(hostname.eq(hostname_value))
            .select(count_star())
            .first(conn)
            .await
            .map_err(TenantDomainError::Database)?;

        Ok(count > 0)
    }

    /// Update certificate state for a hostname
    pub async fn set_ssl_status(
        conn: &mut AsyncPgConnection,
        domain_id: Uuid,
        new_status: SslStatus,
    ) -> Result<Self, TenantDomainError> {
        use crate::schema::tenant_domains::dsl::*;

        diesel::update(tenant_domains.filter(id.eq(domain_id)))
            .set((
                ssl_status.eq(new_status.as_str()),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<TenantDomain>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantDomainError::NotFound,
                _ => TenantDomainError::Database(e),
            })
    }

    pub fn ssl_status_enum(&self) -> SslStatus {
        SslStatus::from_str(&self.ssl_status).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid SSL status '{}' for domain {}, treating as Failed: {}",
                self.ssl_status,
                self.id,
                e
            );
            SslStatus::Failed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_status_round_trip() {
        for status in [SslStatus::Pending, SslStatus::Active, SslStatus::Failed] {
            assert_eq!(SslStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(SslStatus::from_str("revoked").is_err());
    }

    #[test]
    fn test_invalid_ssl_status_falls_back_to_failed() {
        let now = Utc::now();
        let domain = TenantDomain {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            hostname: "acme.tessera.site".to_string(),
            is_primary: true,
            ssl_status: "unknown".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(domain.ssl_status_enum(), SslStatus::Failed);
    }
}
