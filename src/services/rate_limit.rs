// Rate Limiting Service for Tessera Backend
// TES-80: In-memory keyed quotas; launches are expensive, so the creation
// limiter is deliberately tight

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tracing::debug;

use crate::config::RateLimitingConfig;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded, retry in {retry_after}s")]
    LimitExceeded { retry_after: u64 },
}

// =============================================================================
// RATE LIMIT SERVICE
// =============================================================================

pub struct RateLimitService {
    tenant_creation: KeyedLimiter,
    key_validation: KeyedLimiter,
    enabled: bool,
}

impl RateLimitService {
    pub fn new(config: &RateLimitingConfig, enabled: bool) -> Self {
        Self {
            tenant_creation: RateLimiter::keyed(config.tenant_creation.quota()),
            key_validation: RateLimiter::keyed(config.key_validation.quota()),
            enabled,
        }
    }

    /// One launch request against the caller's quota
    pub fn check_tenant_creation(&self, key: &str) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        Self::check(&self.tenant_creation, key)
    }

    /// One validation request against the caller's quota
    pub fn check_key_validation(&self, key: &str) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        Self::check(&self.key_validation, key)
    }

    fn check(limiter: &KeyedLimiter, key: &str) -> Result<(), RateLimitError> {
        match limiter.check_key(&key.to_string()) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                debug!("Rate limit hit for key {}", key);
                Err(RateLimitError::LimitExceeded {
                    retry_after: wait.as_secs().max(1),
                })
            },
        }
    }

    /// Drop per-key state that has fully replenished. Keyed limiters grow
    /// with every new caller; a periodic sweep keeps the maps bounded.
    pub fn cleanup(&self) {
        self.tenant_creation.retain_recent();
        self.key_validation.retain_recent();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    fn tight_config() -> RateLimitingConfig {
        RateLimitingConfig {
            tenant_creation: RateLimitConfig {
                max_requests: 2,
                window_seconds: 3600,
                burst_limit: Some(2),
            },
            key_validation: RateLimitConfig {
                max_requests: 2,
                window_seconds: 3600,
                burst_limit: Some(2),
            },
        }
    }

    #[test]
    fn test_limit_enforced_after_burst() {
        let service = RateLimitService::new(&tight_config(), true);

        assert!(service.check_tenant_creation("user-1").is_ok());
        assert!(service.check_tenant_creation("user-1").is_ok());

        let third = service.check_tenant_creation("user-1");
        match third {
            Err(RateLimitError::LimitExceeded { retry_after }) => {
                assert!(retry_after >= 1);
            },
            Ok(()) => panic!("third request should be limited"),
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let service = RateLimitService::new(&tight_config(), true);

        assert!(service.check_tenant_creation("user-1").is_ok());
        assert!(service.check_tenant_creation("user-1").is_ok());
        assert!(service.check_tenant_creation("user-1").is_err());

        assert!(service.check_tenant_creation("user-2").is_ok());
    }

    #[test]
    fn test_disabled_service_never_limits() {
        let service = RateLimitService::new(&tight_config(), false);

        for _ in 0..20 {
            assert!(service.check_tenant_creation("user-1").is_ok());
        }
    }

    #[test]
    fn test_scopes_do_not_share_state() {
        let service = RateLimitService::new(&tight_config(), true);

        assert!(service.check_tenant_creation("user-1").is_ok());
        assert!(service.check_tenant_creation("user-1").is_ok());
        assert!(service.check_tenant_creation("user-1").is_err());

        assert!(service.check_key_validation("user-1").is_ok());
    }
}
