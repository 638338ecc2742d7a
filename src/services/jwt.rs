// JWT Token Validation Service
// TES-61: HS256 access tokens minted by the identity service; this backend
// validates audience, issuer, and expiry, and never issues refresh tokens.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::AccessTokenClaims;

// Error types for JWT operations
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Key generation error: {0}")]
    KeyGenerationError(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken => JwtError::InvalidToken,
            _ => JwtError::EncodingError(err.to_string()),
        }
    }
}

// JWT configuration for access token validation
#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_expiry: u64, // seconds
    pub algorithm: Algorithm,     // HS256 (HMAC SHA-256)

    // JWT validation settings
    pub audience: String, // Expected audience for tokens (e.g., "tessera.site")
    pub issuer: String,   // Token issuer identifier

    pub access_encoding_key: EncodingKey,
    pub access_decoding_key: DecodingKey,

    // Key versioning for rotation
    pub key_version: u32,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("algorithm", &self.algorithm)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("access_encoding_key", &"<redacted>")
            .field("access_decoding_key", &"<redacted>")
            .field("key_version", &self.key_version)
            .finish()
    }
}

impl JwtConfig {
    /// Build JWT config from provided parameters - shared logic for from_env and for_test
    fn build_from_params(
        access_secret: &str,
        access_expiry: u64,
        audience: String,
        issuer: String,
        key_version: u32,
    ) -> Self {
        let access_encoding_key = EncodingKey::from_secret(access_secret.as_bytes());
        let access_decoding_key = DecodingKey::from_secret(access_secret.as_bytes());

        JwtConfig {
            access_token_expiry: access_expiry,
            algorithm: Algorithm::HS256,
            audience,
            issuer,
            access_encoding_key,
            access_decoding_key,
            key_version,
        }
    }

    /// Create JWT config from centralized app configuration
    pub fn from_env() -> Self {
        let crate::app_config::JwtSettings {
            access_secret,
            access_expiry,
            audience,
            issuer,
            key_version,
        } = &crate::CONFIG.jwt;

        Self::build_from_params(
            access_secret,
            *access_expiry,
            audience.clone(),
            issuer.clone(),
            *key_version,
        )
    }

    /// Create JWT config for tests without using lazy static
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::build_from_params(
            "test-access-secret-hs256-long-enough",
            3600, // 1 hour
            "test.tessera.site".to_string(),
            "test.tessera.site".to_string(),
            1,
        )
    }
}

// JWT validation service
pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    /// Create new JWT service with configuration
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    /// Create JWT service from environment
    pub fn from_env() -> Self {
        Self::new(JwtConfig::from_env())
    }

    /// Generate access token
    ///
    /// Production tokens come from the identity service; this mint exists
    /// for local development and the integration test harness.
    pub fn generate_access_token(
        &self,
        user_id: &str,
        email: &str,
        scope: Vec<String>,
    ) -> Result<String, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JwtError::KeyGenerationError(e.to_string()))?
            .as_secs();

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: email.to_string(),
            scope,
            aud: self.config.audience.clone(),
            iss: self.config.issuer.clone(),
            iat: now,
            exp: now + self.config.access_token_expiry,
        };

        let mut header = Header::new(self.config.algorithm);
        header.kid = Some(self.config.key_version.to_string());

        encode(&header, &claims, &self.config.access_encoding_key).map_err(Into::into)
    }

    /// Validates an access token and returns the decoded claims
    ///
    /// # Errors
    /// * `JwtError::EncodingError` - Token format is invalid or signature verification failed
    /// * `JwtError::TokenExpired` - Token has expired (checked with leeway=0 for strict validation)
    /// * `JwtError::InvalidToken` - Token validation failed for other reasons
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0; // No leeway for expiry validation

        let token_data =
            decode::<AccessTokenClaims>(token, &self.config.access_decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        let config = JwtConfig::for_test();
        let service = JwtService::new(config);

        let token = service
            .generate_access_token(
                "test-user-id",
                "test@example.com",
                vec!["tenants:write".to_string()],
            )
            .unwrap();

        assert!(!token.is_empty());
    }

    #[test]
    fn test_token_validation() {
        let config = JwtConfig::for_test();
        let service = JwtService::new(config);

        let token = service
            .generate_access_token(
                "test-user-id",
                "test@example.com",
                vec!["tenants:write".to_string()],
            )
            .unwrap();

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, "test-user-id");
        assert_eq!(claims.email, "test@example.com");
        assert!(claims.has_scope("tenants:write"));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let service = JwtService::new(JwtConfig::for_test());
        let token = service
            .generate_access_token("user", "u@example.com", vec![])
            .unwrap();

        let mut other = JwtConfig::for_test();
        other.audience = "other.example.com".to_string();
        let other_service = JwtService::new(other);

        assert!(other_service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let service = JwtService::new(JwtConfig::for_test());
        let token = service
            .generate_access_token("user", "u@example.com", vec![])
            .unwrap();

        let tampered = format!("{}x", token);
        assert!(service.validate_access_token(&tampered).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = JwtConfig::for_test();
        config.access_token_expiry = 0;
        let service = JwtService::new(config);

        let token = service
            .generate_access_token("user", "u@example.com", vec![])
            .unwrap();

        // exp == iat; with leeway 0 the token is already expired
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let result = service.validate_access_token(&token);
        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }
}
