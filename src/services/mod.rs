// Services module for Tessera Core Backend (OSS)
// Business logic layer for the application

pub mod email;
pub mod flags;
pub mod jobs;
pub mod jwt;
pub mod key_validation;
pub mod launcher;
pub mod rate_limit;
pub mod registrar;
pub mod supabase;
pub mod vault;

// Re-export commonly used services
pub use email::{EmailError, EmailService};
pub use flags::{FlagError, FlagService, PropagateFlagsRequest, PropagateFlagsResponse};
pub use jobs::{JobError, JobService};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use key_validation::{KeyValidationResult, KeyValidationService, ValidateKeyRequest};
pub use launcher::{LaunchOrchestrator, LAUNCH_STEPS};
pub use rate_limit::{RateLimitError, RateLimitService};
pub use registrar::{DomainRegistrar, RegistrarError};
pub use supabase::{ProvisionedDatabase, ProvisionerError, SupabaseProvisioner, TenantSeed};
pub use vault::{VaultError, VaultService};
