// Centralized Rate Limiting Configuration
// In-memory keyed limits; provisioning launches are expensive so their
// quota is deliberately low.

use governor::Quota;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Limit settings for one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests allowed per window
    pub max_requests: u32,

    /// Window length in seconds
    pub window_seconds: u32,

    /// Short-burst allowance on top of the sustained rate
    pub burst_limit: Option<u32>,
}

impl RateLimitConfig {
    /// Translate into a governor quota (sustained rate + burst)
    pub fn quota(&self) -> Quota {
        let per = self.max_requests.max(1);
        let window = self.window_seconds.max(1);
        let period = Duration::from_secs_f64(window as f64 / per as f64);
        let burst = NonZeroU32::new(self.burst_limit.unwrap_or(per).max(1))
            .unwrap_or(NonZeroU32::MIN);

        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_hour(NonZeroU32::MIN))
            .allow_burst(burst)
    }
}

/// Rate limiting configuration for the provisioning API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Tenant creation (launches a full pipeline per request)
    pub tenant_creation: RateLimitConfig,

    /// Credential validation (hits third-party provider APIs)
    pub key_validation: RateLimitConfig,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        let tenant_creation = RateLimitConfig {
            max_requests: std::env::var("RATE_LIMIT_LAUNCH_MAX")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            window_seconds: std::env::var("RATE_LIMIT_LAUNCH_WINDOW")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            burst_limit: Some(3),
        };

        let key_validation = RateLimitConfig {
            max_requests: std::env::var("RATE_LIMIT_VALIDATION_MAX")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            window_seconds: std::env::var("RATE_LIMIT_VALIDATION_WINDOW")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            burst_limit: Some(10),
        };

        Self {
            tenant_creation,
            key_validation,
        }
    }
}

impl RateLimitingConfig {
    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, config) in [
            ("tenant_creation", &self.tenant_creation),
            ("key_validation", &self.key_validation),
        ] {
            if config.max_requests == 0 {
                return Err(format!("{} max_requests cannot be zero", name));
            }
            if config.window_seconds == 0 {
                return Err(format!("{} window_seconds cannot be zero", name));
            }
        }
        Ok(())
    }
}
