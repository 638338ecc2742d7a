// TES-77: Six-step launch pipeline
// One detached task per launch job. The job row is the progress ledger; every
// step transition is persisted before the pipeline moves on, so a poll never
// sees work the job has not admitted to.

use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::app_config::CONFIG;
use crate::models::tenant::{
    CreateTenantRequest, NewTenant, Tenant, TenantKeysInput, TenantStatus,
};
use crate::models::tenant_domain::{NewTenantDomain, SslStatus, TenantDomain};
use crate::models::tenant_job::{JobStep, JobType, StepStatus, TenantJob};
use crate::models::tenant_key::KeyKind;
use crate::services::jobs::JobService;
use crate::services::supabase::{ProvisionedDatabase, TenantSeed};
use crate::utils::launch_errors::{LaunchError, LaunchResult};

/// Pipeline steps in execution order, by the names job polls expose
pub const LAUNCH_STEPS: [&str; 6] = [
    "create database",
    "run migrations",
    "seed configuration",
    "configure domain",
    "store credentials",
    "activate",
];

const DEFAULT_TEMPLATE: &str = "standard";
const DEFAULT_THEME: &str = "default";

/// Why a run stopped before the final step
enum PipelineHalt {
    /// A step failed; the step entry already carries the error text
    Failed { message: String },
    /// A step blew its deadline; the step entry is already `timed_out`
    TimedOut { message: String },
    /// Bookkeeping broke (pool or job-row writes), step state unknown
    Fault(String),
}

#[derive(Clone)]
pub struct LaunchOrchestrator {
    state: AppState,
    step_timeout: Duration,
    notify_admin: bool,
}

impl LaunchOrchestrator {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            step_timeout: Duration::from_secs(CONFIG.launch.step_timeout_secs),
            notify_admin: CONFIG.launch.notify_admin,
        }
    }

    /// Create the tenant and its launch job in one transaction.
    ///
    /// Afterwards both rows exist or neither does. A slug lost to a
    /// concurrent launch surfaces as `SlugTaken` from the unique index,
    /// not as a duplicate tenant.
    pub async fn create_launch(
        &self,
        request: &CreateTenantRequest,
    ) -> LaunchResult<(Tenant, TenantJob)> {
        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| LaunchError::DatabaseError(format!("Failed to get connection: {}", e)))?;

        let new_tenant = NewTenant {
            team_id: request.team_id,
            slug: request.slug.clone(),
            display_name: request.display_name.clone(),
            template: request
                .template
                .clone()
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            theme: request
                .theme
                .clone()
                .unwrap_or_else(|| DEFAULT_THEME.to_string()),
            feature_flags: serde_json::Value::Object(request.feature_flags.clone()),
            status: TenantStatus::Provisioning.as_str().to_string(),
            admin_email: request.admin_email.clone(),
        };

        conn.build_transaction()
            .run::<_, LaunchError, _>(|conn| {
                Box::pin(async move {
                    let tenant = Tenant::create(conn, new_tenant).await?;
                    let steps: Vec<JobStep> = LAUNCH_STEPS
                        .iter()
                        .map(|name| JobStep::pending(name))
                        .collect();
                    let job =
                        JobService::create_job(conn, tenant.id, JobType::Launch, &steps).await?;
                    Ok((tenant, job))
                })
            })
            .await
    }

    /// Detach the pipeline for an accepted launch and return immediately
    pub fn spawn_pipeline(
        &self,
        tenant: Tenant,
        job: TenantJob,
        custom_domain: Option<String>,
        keys: TenantKeysInput,
    ) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator
                .run_pipeline(tenant, job, custom_domain, keys)
                .await;
        });
    }

    #[instrument(skip(self, tenant, job, custom_domain, keys), fields(tenant_id = %tenant.id, job_id = %job.id))]
    async fn run_pipeline(
        &self,
        tenant: Tenant,
        job: TenantJob,
        custom_domain: Option<String>,
        keys: TenantKeysInput,
    ) {
        info!("[LAUNCH] Pipeline started for tenant '{}'", tenant.slug);
        self.state.metrics.launch().job_started(&job.job_type);

        let outcome = self
            .execute_steps(&tenant, job.id, custom_domain.as_deref(), keys)
            .await;

        match outcome {
            Ok(()) => {
                if let Err(e) = self.finish(job.id).await {
                    error!("[LAUNCH] Completing job {} failed: {}", job.id, e);
                }
                self.state.metrics.launch().job_finished("completed");
                info!("[LAUNCH] Tenant '{}' is live", tenant.slug);
                self.notify(&tenant, None).await;
            }
            Err(PipelineHalt::TimedOut { message }) => {
                warn!(
                    "[LAUNCH] Pipeline for '{}' timed out: {}",
                    tenant.slug, message
                );
                if let Err(e) = self.terminate_timed_out(job.id, tenant.id, &message).await {
                    error!("[LAUNCH] Recording timeout for job {} failed: {}", job.id, e);
                }
                self.state.metrics.launch().job_finished("timed_out");
                self.notify(&tenant, Some(&message)).await;
            }
            Err(PipelineHalt::Failed { message }) | Err(PipelineHalt::Fault(message)) => {
                warn!("[LAUNCH] Pipeline for '{}' failed: {}", tenant.slug, message);
                if let Err(e) = self.terminate_failed(job.id, tenant.id, &message).await {
                    error!("[LAUNCH] Recording failure for job {} failed: {}", job.id, e);
                }
                self.state.metrics.launch().job_finished("failed");
                self.notify(&tenant, Some(&message)).await;
            }
        }
    }

    async fn execute_steps(
        &self,
        tenant: &Tenant,
        job_id: Uuid,
        custom_domain: Option<&str>,
        keys: TenantKeysInput,
    ) -> Result<(), PipelineHalt> {
        // 1. create database
        let provisioned = self
            .run_step(job_id, 0, async {
                self.state
                    .provisioner
                    .create_database(&tenant.slug)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await?;

        // The ref must survive a crash between steps, so it lands on the
        // tenant row before migrations start
        {
            let mut conn = self
                .state
                .diesel_pool
                .get()
                .await
                .map_err(|e| PipelineHalt::Fault(format!("Failed to get connection: {}", e)))?;
            Tenant::record_project_ref(&mut conn, tenant.id, &provisioned.project_ref)
                .await
                .map_err(|e| PipelineHalt::Fault(format!("Recording project ref: {}", e)))?;
        }

        // 2. run migrations
        let schema_version = self
            .run_step(job_id, 1, async {
                self.state
                    .provisioner
                    .run_migrations(&provisioned.project_ref)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await?;

        {
            let mut conn = self
                .state
                .diesel_pool
                .get()
                .await
                .map_err(|e| PipelineHalt::Fault(format!("Failed to get connection: {}", e)))?;
            Tenant::record_schema_version(&mut conn, tenant.id, &schema_version)
                .await
                .map_err(|e| PipelineHalt::Fault(format!("Recording schema version: {}", e)))?;
        }

        // 3. seed configuration
        let seed = TenantSeed {
            site_name: tenant.display_name.clone(),
            template: tenant.template.clone(),
            theme: tenant.theme.clone(),
            admin_email: tenant.admin_email.clone(),
            feature_flags: tenant.feature_flags.clone(),
        };
        self.run_step(job_id, 2, async {
            self.state
                .provisioner
                .seed_database(&provisioned.api_url, &provisioned.service_role_key, &seed)
                .await
                .map_err(|e| e.to_string())
        })
        .await?;

        // 4. configure domain
        self.run_step(job_id, 3, self.configure_domains(tenant, custom_domain))
            .await?;

        // 5. store credentials
        self.run_step(job_id, 4, self.store_credentials(tenant.id, &provisioned, keys))
            .await?;

        // 6. activate
        self.run_step(job_id, 5, async {
            let mut conn = self
                .state
                .diesel_pool
                .get()
                .await
                .map_err(|e| e.to_string())?;
            Tenant::set_status(&mut conn, tenant.id, TenantStatus::Active)
                .await
                .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await?;

        Ok(())
    }

    /// Drive one step: mark it running, race the work against the per-step
    /// deadline, persist the outcome
    async fn run_step<T, F>(&self, job_id: Uuid, index: usize, work: F) -> Result<T, PipelineHalt>
    where
        F: std::future::Future<Output = Result<T, String>>,
    {
        let name = LAUNCH_STEPS[index];
        self.mark_step(job_id, index, StepStatus::Running, None)
            .await
            .map_err(PipelineHalt::Fault)?;
        info!("[LAUNCH] Step '{}' started for job {}", name, job_id);

        let started = Instant::now();
        match tokio::time::timeout(self.step_timeout, work).await {
            Ok(Ok(value)) => {
                self.state
                    .metrics
                    .launch()
                    .observe_step(name, started.elapsed().as_secs_f64());
                self.mark_step(job_id, index, StepStatus::Completed, None)
                    .await
                    .map_err(PipelineHalt::Fault)?;
                info!("[LAUNCH] Step '{}' completed for job {}", name, job_id);
                Ok(value)
            }
            Ok(Err(cause)) => {
                let message = format!("Step '{}' failed: {}", name, cause);
                if let Err(e) = self
                    .mark_step(job_id, index, StepStatus::Failed, Some(&message))
                    .await
                {
                    error!("[LAUNCH] Marking step '{}' failed on job {}: {}", name, job_id, e);
                }
                Err(PipelineHalt::Failed { message })
            }
            Err(_) => {
                let message = format!(
                    "Step '{}' exceeded the {}s deadline",
                    name,
                    self.step_timeout.as_secs()
                );
                if let Err(e) = self
                    .mark_step(job_id, index, StepStatus::TimedOut, Some(&message))
                    .await
                {
                    error!(
                        "[LAUNCH] Marking step '{}' timed out on job {}: {}",
                        name, job_id, e
                    );
                }
                Err(PipelineHalt::TimedOut { message })
            }
        }
    }

    /// Register the mandatory subdomain, then the optional custom hostname.
    ///
    /// The subdomain is the tenant's address; losing it fails the launch.
    /// A custom hostname is a convenience that can be retried later, so its
    /// failure is recorded on the domain row and the pipeline continues.
    async fn configure_domains(
        &self,
        tenant: &Tenant,
        custom_domain: Option<&str>,
    ) -> Result<(), String> {
        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| e.to_string())?;

        let hostname = self.state.registrar.subdomain_hostname(&tenant.slug);
        let registration = self
            .state
            .registrar
            .add_domain(&hostname)
            .await
            .map_err(|e| e.to_string())?;
        let ssl_status = if registration.verified {
            SslStatus::Active
        } else {
            SslStatus::Pending
        };
        TenantDomain::create(
            &mut conn,
            NewTenantDomain {
                tenant_id: tenant.id,
                hostname,
                is_primary: true,
                ssl_status: ssl_status.as_str().to_string(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;

        if let Some(custom) = custom_domain {
            let ssl_status = match self.state.registrar.add_domain(custom).await {
                Ok(registration) => {
                    if registration.verified {
                        SslStatus::Active
                    } else {
                        SslStatus::Pending
                    }
                }
                Err(e) => {
                    warn!(
                        "[LAUNCH] Custom domain '{}' registration failed: {}",
                        custom, e
                    );
                    SslStatus::Failed
                }
            };
            if let Err(e) = TenantDomain::create(
                &mut conn,
                NewTenantDomain {
                    tenant_id: tenant.id,
                    hostname: custom.to_string(),
                    is_primary: false,
                    ssl_status: ssl_status.as_str().to_string(),
                },
            )
            .await
            {
                warn!("[LAUNCH] Recording custom domain '{}' failed: {}", custom, e);
            }
        }

        Ok(())
    }

    /// Seal the provisioned credentials plus whatever keys the request
    /// supplied into the vault as one batch
    async fn store_credentials(
        &self,
        tenant_id: Uuid,
        provisioned: &ProvisionedDatabase,
        keys: TenantKeysInput,
    ) -> Result<(), String> {
        let mut entries = vec![
            (KeyKind::DatabaseUrl, provisioned.database_url.clone()),
            (KeyKind::AnonKey, provisioned.anon_key.clone()),
            (KeyKind::ServiceRoleKey, provisioned.service_role_key.clone()),
        ];
        if let Some(value) = keys.maps_api_key {
            entries.push((KeyKind::MapsApiKey, value));
        }
        if let Some(value) = keys.ai_api_key {
            entries.push((KeyKind::AiApiKey, value));
        }
        if let Some(value) = keys.email_api_key {
            entries.push((KeyKind::EmailApiKey, value));
        }
        if let Some(value) = keys.upstream_api_token {
            entries.push((KeyKind::UpstreamApiToken, value));
        }

        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| e.to_string())?;
        let stored = self
            .state
            .vault
            .store_keys(&mut conn, tenant_id, entries)
            .await
            .map_err(|e| e.to_string())?;
        info!("[LAUNCH] Stored {} credentials for tenant {}", stored, tenant_id);
        Ok(())
    }

    async fn mark_step(
        &self,
        job_id: Uuid,
        index: usize,
        status: StepStatus,
        message: Option<&str>,
    ) -> Result<(), String> {
        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| format!("Failed to get connection: {}", e))?;
        JobService::update_step(&mut conn, job_id, index, status, message)
            .await
            .map_err(|e| e.to_string())
    }

    async fn finish(&self, job_id: Uuid) -> Result<(), String> {
        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| format!("Failed to get connection: {}", e))?;
        JobService::complete_job(&mut conn, job_id)
            .await
            .map_err(|e| e.to_string())
    }

    async fn terminate_failed(
        &self,
        job_id: Uuid,
        tenant_id: Uuid,
        message: &str,
    ) -> Result<(), String> {
        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| format!("Failed to get connection: {}", e))?;
        JobService::fail_job(&mut conn, job_id, tenant_id, message)
            .await
            .map_err(|e| e.to_string())
    }

    async fn terminate_timed_out(
        &self,
        job_id: Uuid,
        tenant_id: Uuid,
        message: &str,
    ) -> Result<(), String> {
        let mut conn = self
            .state
            .diesel_pool
            .get()
            .await
            .map_err(|e| format!("Failed to get connection: {}", e))?;
        JobService::timeout_job(&mut conn, job_id, tenant_id, message)
            .await
            .map_err(|e| e.to_string())
    }

    /// Best-effort terminal notification; a delivery failure only logs
    async fn notify(&self, tenant: &Tenant, failure: Option<&str>) {
        if !self.notify_admin {
            return;
        }
        let result = match failure {
            None => {
                let site_url = tenant.site_url(&CONFIG.tenant_root_domain);
                self.state
                    .email_service
                    .send_tenant_launched(&tenant.admin_email, &tenant.display_name, &site_url)
                    .await
            }
            Some(reason) => {
                self.state
                    .email_service
                    .send_tenant_launch_failed(
                        &tenant.admin_email,
                        &tenant.display_name,
                        &tenant.slug,
                        reason,
                    )
                    .await
            }
        };
        if let Err(e) = result {
            warn!(
                "[LAUNCH] Notification email for '{}' failed: {}",
                tenant.slug, e
            );
        }
    }
}
