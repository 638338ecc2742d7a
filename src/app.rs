// Application state and configuration
use std::sync::Arc;

use crate::{
    db::DieselPool,
    services::{
        DomainRegistrar, EmailService, JwtService, KeyValidationService, RateLimitService,
        SupabaseProvisioner, VaultService,
    },
    utils::metrics::SharedMetrics,
};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub diesel_pool: DieselPool,
    pub jwt_service: Arc<JwtService>,
    pub rate_limit_service: Arc<RateLimitService>,
    pub vault: Arc<VaultService>,
    pub provisioner: Arc<SupabaseProvisioner>,
    pub registrar: Arc<DomainRegistrar>,
    pub key_validator: Arc<KeyValidationService>,
    pub email_service: Arc<EmailService>,
    pub metrics: SharedMetrics,
    pub max_connections: u32,
}
