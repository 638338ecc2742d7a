// Migration orchestrator for Tessera Backend
// Embedded in the application binary for distroless container compatibility.
// This runner covers the platform metadata store only; per-tenant database
// schemas are applied by the provisioner service against the tenant instance.

pub mod diesel;

use crate::db::DieselPool;
use std::error::Error;
use tracing::{error, info};

/// Configuration for migration execution
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub skip_diesel: bool,
    pub environment: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        let config = crate::app_config::config();

        Self {
            skip_diesel: false,
            environment: config.environment.to_string(),
        }
    }
}

/// Main migration orchestrator
pub async fn run_all_migrations(
    diesel_pool: &DieselPool,
    config: MigrationConfig,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!(
        "[MIGRATIONS] Starting migration process for environment: {}",
        config.environment
    );

    let mut migration_count = 0;

    if !config.skip_diesel {
        info!("[MIGRATIONS] Running Diesel (PostgreSQL) migrations...");
        match diesel::run_migrations(diesel_pool).await {
            Ok(applied_count) => {
                migration_count += applied_count;
                if applied_count > 0 {
                    info!("[MIGRATIONS] ✓ Applied {} Diesel migrations", applied_count);
                } else {
                    info!("[MIGRATIONS] ✓ Diesel migrations up to date");
                }
            },
            Err(e) => {
                error!("[MIGRATIONS] ✗ Diesel migration failed: {}", e);
                return Err(format!("Diesel migration failed: {}", e).into());
            },
        }
    } else {
        info!("[MIGRATIONS] Skipping Diesel migrations (disabled in config)");
    }

    if migration_count > 0 {
        info!(
            "[MIGRATIONS] ✓ Migration process completed successfully - applied {} total migrations",
            migration_count
        );
    } else {
        info!("[MIGRATIONS] ✓ Migration process completed - all migrations up to date");
    }

    Ok(())
}

/// Check if migrations should run based on environment variables
pub fn should_run_migrations() -> bool {
    let config = crate::app_config::config();

    !config.disable_embedded_migrations
}
