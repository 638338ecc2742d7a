pub mod auth;
pub mod tenant;
pub mod tenant_domain;
pub mod tenant_job;
pub mod tenant_key;

// Re-export common types
pub use auth::*;
pub use tenant::{
    CreateTenantRequest, LaunchResponse, NewTenant, SlugAvailabilityResponse, Tenant,
    TenantError, TenantKeysInput, TenantProjection, TenantStatus, TenantUpdate,
};
pub use tenant_domain::{NewTenantDomain, SslStatus, TenantDomain, TenantDomainError};
pub use tenant_job::{
    JobStatus, JobStatusResponse, JobStep, JobType, NewTenantJob, StepStatus, TenantJob,
    TenantJobError,
};
pub use tenant_key::{KeyKind, NewTenantKey, TenantKey, TenantKeyError};
