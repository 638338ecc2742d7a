// Credential Vault Service
// TES-76: Seals provider credentials with AES-256-GCM before they touch the
// tenant_keys table. Sealed format: "v{version}:{nonce_hex}:{ciphertext_hex}"

use diesel_async::AsyncPgConnection;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::tenant_key::{KeyKind, NewTenantKey, TenantKey};

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Key version {0} not present in keyring")]
    UnknownVersion(u32),

    #[error("Invalid master key material for version {0}")]
    InvalidKey(u32),

    #[error("Malformed sealed value")]
    Malformed,

    #[error("Encryption failed")]
    Seal,

    #[error("Decryption failed")]
    Open,

    #[error("Database error: {0}")]
    Database(String),
}

/// Versioned encryption service over a keyring of 256-bit master keys.
///
/// New values are sealed with the active version; `open` accepts any version
/// still present in the keyring, so rotating the active key keeps old rows
/// readable without re-encryption.
pub struct VaultService {
    active_version: u32,
    keys: HashMap<u32, [u8; 32]>,
    rng: SystemRandom,
}

impl VaultService {
    pub fn new(active_version: u32, keys: HashMap<u32, [u8; 32]>) -> Result<Self, VaultError> {
        if !keys.contains_key(&active_version) {
            return Err(VaultError::UnknownVersion(active_version));
        }
        Ok(Self {
            active_version,
            keys,
            rng: SystemRandom::new(),
        })
    }

    /// Build the keyring from centralized app configuration
    pub fn from_env() -> Result<Self, VaultError> {
        let config = &crate::CONFIG.vault;
        let mut keys = HashMap::new();

        for (version, hex_key) in &config.keys {
            let bytes = hex::decode(hex_key).map_err(|_| VaultError::InvalidKey(*version))?;
            let key: [u8; 32] = bytes
                .try_into()
                .map_err(|_| VaultError::InvalidKey(*version))?;
            keys.insert(*version, key);
        }

        Self::new(config.active_version, keys)
    }

    /// Seal plaintext with the active key version.
    /// Returns: "v{version}:{12_byte_nonce_hex}:{ciphertext_hex}"
    pub fn seal(&self, plaintext: &str) -> Result<String, VaultError> {
        let key_bytes = self
            .keys
            .get(&self.active_version)
            .ok_or(VaultError::UnknownVersion(self.active_version))?;

        let unbound =
            UnboundKey::new(&AES_256_GCM, key_bytes).map_err(|_| VaultError::Seal)?;
        let key = LessSafeKey::new(unbound);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| VaultError::Seal)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::Seal)?;

        Ok(format!(
            "v{}:{}:{}",
            self.active_version,
            hex::encode(nonce_bytes),
            hex::encode(in_out)
        ))
    }

    /// Open a sealed value. Supports any key version present in the keyring.
    pub fn open(&self, sealed: &str) -> Result<String, VaultError> {
        let parts: Vec<&str> = sealed.splitn(3, ':').collect();
        if parts.len() != 3 || !parts[0].starts_with('v') {
            return Err(VaultError::Malformed);
        }

        let version: u32 = parts[0][1..].parse().map_err(|_| VaultError::Malformed)?;
        let nonce_bytes = hex::decode(parts[1]).map_err(|_| VaultError::Malformed)?;
        let ciphertext = hex::decode(parts[2]).map_err(|_| VaultError::Malformed)?;

        if nonce_bytes.len() != NONCE_LEN {
            return Err(VaultError::Malformed);
        }

        let key_bytes = self
            .keys
            .get(&version)
            .ok_or(VaultError::UnknownVersion(version))?;

        let unbound =
            UnboundKey::new(&AES_256_GCM, key_bytes).map_err(|_| VaultError::Open)?;
        let key = LessSafeKey::new(unbound);
        let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes).map_err(|_| VaultError::Open)?;

        let mut in_out = ciphertext;
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::Open)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| VaultError::Open)
    }

    /// Seal and store a batch of credentials for a tenant.
    ///
    /// The whole batch is one database transaction: either every kind is
    /// persisted or none is. Existing kinds are replaced.
    pub async fn store_keys(
        &self,
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
        entries: Vec<(KeyKind, String)>,
    ) -> Result<usize, VaultError> {
        let mut new_keys = Vec::with_capacity(entries.len());
        for (kind, value) in entries {
            new_keys.push(NewTenantKey {
                tenant_id,
                kind: kind.as_str().to_string(),
                encrypted_value: self.seal(&value)?,
            });
        }

        TenantKey::upsert_many(conn, new_keys)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))
    }

    /// Fetch and open one stored credential
    pub async fn fetch_key(
        &self,
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
        kind: KeyKind,
    ) -> Result<String, VaultError> {
        let row = TenantKey::find(conn, tenant_id, kind)
            .await
            .map_err(|e| VaultError::Database(e.to_string()))?;
        self.open(&row.encrypted_value)
    }

    pub fn active_version(&self) -> u32 {
        self.active_version
    }

    #[cfg(test)]
    pub fn new_for_test() -> Self {
        let mut keys = HashMap::new();
        keys.insert(1, [0u8; 32]);
        Self::new(1, keys).expect("test keyring")
    }
}
