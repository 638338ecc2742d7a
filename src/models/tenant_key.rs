// Tenant Key Database Model
// TES-76: Encrypted provider credentials, one row per (tenant, kind)

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::schema::tenant_keys;

/// Credential kinds the vault accepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    DatabaseUrl,
    AnonKey,
    ServiceRoleKey,
    MapsApiKey,
    AiApiKey,
    EmailApiKey,
    UpstreamApiToken,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::DatabaseUrl => "database_url",
            KeyKind::AnonKey => "anon_key",
            KeyKind::ServiceRoleKey => "service_role_key",
            KeyKind::MapsApiKey => "maps_api_key",
            KeyKind::AiApiKey => "ai_api_key",
            KeyKind::EmailApiKey => "email_api_key",
            KeyKind::UpstreamApiToken => "upstream_api_token",
        }
    }

    /// Kinds written by the launch pipeline itself rather than the user
    pub fn is_platform_managed(&self) -> bool {
        matches!(
            self,
            KeyKind::DatabaseUrl | KeyKind::AnonKey | KeyKind::ServiceRoleKey
        )
    }
}

impl FromStr for KeyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "database_url" => Ok(KeyKind::DatabaseUrl),
            "anon_key" => Ok(KeyKind::AnonKey),
            "service_role_key" => Ok(KeyKind::ServiceRoleKey),
            "maps_api_key" => Ok(KeyKind::MapsApiKey),
            "ai_api_key" => Ok(KeyKind::AiApiKey),
            "email_api_key" => Ok(KeyKind::EmailApiKey),
            "upstream_api_token" => Ok(KeyKind::UpstreamApiToken),
            _ => Err(format!("Unknown key kind: {}", s)),
        }
    }
}

/// Tenant key database model
///
/// `encrypted_value` is vault ciphertext; plaintext never touches this table.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tenant_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TenantKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: String,
    pub encrypted_value: String,
    pub validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New key row for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tenant_keys)]
pub struct NewTenantKey {
    pub tenant_id: Uuid,
    pub kind: String,
    pub encrypted_value: String,
}

#[derive(thiserror::Error, Debug)]
pub enum TenantKeyError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Key not found")]
    NotFound,
}

impl TenantKey {
    /// Insert or replace the key of this kind for the tenant.
    ///
    /// Rewriting a kind resets `validated_at`: a new secret is unproven
    /// until the next validation pass.
    pub async fn upsert(
        conn: &mut AsyncPgConnection,
        new_key: NewTenantKey,
    ) -> Result<Self, TenantKeyError> {
        use crate::schema::tenant_keys::dsl::*;
        use diesel::upsert::excluded;

        diesel::insert_into(tenant_keys)
            .values(&new_key)
            .on_conflict((tenant_id, kind))
            .do_update()
            .set((
                encrypted_value.eq(excluded(encrypted_value)),
                validated_at.eq(None::<DateTime<Utc>>),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<TenantKey>(conn)
            .await
            .map_err(TenantKeyError::Database)
    }

    /// Upsert a batch of keys atomically
    pub async fn upsert_many(
        conn: &mut AsyncPgConnection,
        new_keys: Vec<NewTenantKey>,
    ) -> Result<usize, TenantKeyError> {
        use diesel_async::AsyncConnection;

        let stored = conn
            .build_transaction()
            .run::<_, diesel::result::Error, _>(|tx| {
                Box::pin(async move {
                    let mut count = 0;
                    for new_key in new_keys {
                        use crate::schema::tenant_keys::dsl::*;
                        use diesel::upsert::excluded;

                        diesel::insert_into(tenant_keys)
                            .values(&new_key)
                            .on_conflict((tenant_id, kind))
                            .do_update()
                            .set((
                                encrypted_value.eq(excluded(encrypted_value)),
                                validated_at.eq(None::<DateTime<Utc>>),
                                updated_at.eq(Utc::now()),
                            ))
                            .execute(tx)
                            .await?;
                        count += 1;
                    }
                    Ok(count)
                })
            })
            .await
            .map_err(TenantKeyError::Database)?;

        Ok(stored)
    }

    /// Fetch one key by tenant and kind
    pub async fn find(
        conn: &mut AsyncPgConnection,
        tenant: Uuid,
        key_kind: KeyKind,
    ) -> Result<Self, TenantKeyError> {
        use crate::schema::tenant_keys::dsl::*;

        tenant_keys
            .filter(tenant_id.eq(tenant))
            .filter(kind.eq(key_kind.as_str()))
            .first::<TenantKey>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantKeyError::NotFound,
                _ => TenantKeyError::Database(e),
            })
    }

    /// All keys stored for a tenant
    pub async fn list_for_tenant(
        conn: &mut AsyncPgConnection,
        tenant: Uuid,
    ) -> Result<Vec<Self>, TenantKeyError> {
        use crate::schema::tenant_keys::dsl::*;

        tenant_keys
            .filter(tenant_id.eq(tenant))
            .order(kind.asc())
            .load::<TenantKey>(conn)
            .await
            .map_err(TenantKeyError::Database)
    }

    /// Stamp a key as validated now
    pub async fn mark_validated(
        conn: &mut AsyncPgConnection,
        tenant: Uuid,
        key_kind: KeyKind,
    ) -> Result<Self, TenantKeyError> {
        use crate::schema::tenant_keys::dsl::*;

        diesel::update(
            tenant_keys
                .filter(tenant_id.eq(tenant))
                .filter(kind.eq(key_kind.as_str())),
        )
        .set((validated_at.eq(Some(Utc::now())), updated_at.eq(Utc::now())))
        .get_result::<TenantKey>(conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::NotFound => TenantKeyError::NotFound,
            _ => TenantKeyError::Database(e),
        })
    }

    pub fn kind_enum(&self) -> Option<KeyKind> {
        KeyKind::from_str(&self.kind).ok()
    }
}
