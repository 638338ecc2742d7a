// Configuration modules for Tessera Backend

pub mod rate_limit;

pub use rate_limit::{RateLimitConfig, RateLimitingConfig};
