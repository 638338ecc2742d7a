// TES-72: Job state machine writes
// The orchestrator is the only writer for a job; these helpers keep the job
// row and the owning tenant row consistent

use diesel_async::AsyncPgConnection;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::tenant::{Tenant, TenantError, TenantStatus};
use crate::models::tenant_job::{
    JobStatus, JobStep, JobType, NewTenantJob, StepStatus, TenantJob, TenantJobError,
};

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Step index {0} out of range")]
    StepIndex(usize),

    #[error("Corrupt steps payload: {0}")]
    Steps(String),
}

impl From<diesel::result::Error> for JobError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => JobError::NotFound,
            _ => JobError::Database(err.to_string()),
        }
    }
}

impl From<TenantJobError> for JobError {
    fn from(err: TenantJobError) -> Self {
        match err {
            TenantJobError::NotFound => JobError::NotFound,
            TenantJobError::Database(e) => JobError::Database(e.to_string()),
            TenantJobError::Steps(e) => JobError::Steps(e.to_string()),
        }
    }
}

impl From<TenantError> for JobError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound => JobError::NotFound,
            TenantError::Pool(e) => JobError::Pool(e),
            other => JobError::Database(other.to_string()),
        }
    }
}

// =============================================================================
// JOB SERVICE
// =============================================================================

pub struct JobService;

impl JobService {
    /// Insert a job already in `running` with every step `pending`
    pub async fn create_job(
        conn: &mut AsyncPgConnection,
        tenant_id: Uuid,
        job_type: JobType,
        initial_steps: &[JobStep],
    ) -> Result<TenantJob, JobError> {
        let steps =
            serde_json::to_value(initial_steps).map_err(|e| JobError::Steps(e.to_string()))?;

        let job = TenantJob::create(
            conn,
            NewTenantJob {
                tenant_id,
                job_type: job_type.as_str().to_string(),
                status: JobStatus::Running.as_str().to_string(),
                steps,
            },
        )
        .await?;

        info!(
            "Created {} job {} for tenant {}",
            job.job_type, job.id, tenant_id
        );
        Ok(job)
    }

    /// Advance one step and persist the whole array back.
    ///
    /// Read-modify-write over the jsonb aggregate; last-writer-wins at job
    /// granularity, which is safe because each job has a single writer.
    pub async fn update_step(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        index: usize,
        new_status: StepStatus,
        error_message: Option<&str>,
    ) -> Result<(), JobError> {
        let job = TenantJob::find_by_id(conn, job_id).await?;
        let mut steps = job.parse_steps()?;

        let step = steps.get_mut(index).ok_or(JobError::StepIndex(index))?;
        step.advance(new_status, error_message.map(str::to_string));

        TenantJob::write_steps(conn, job_id, &steps).await?;
        Ok(())
    }

    /// Mark the job failed and suspend its tenant, in one transaction
    #[instrument(skip(conn, message))]
    pub async fn fail_job(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        tenant_id: Uuid,
        message: &str,
    ) -> Result<(), JobError> {
        Self::terminate(conn, job_id, tenant_id, JobStatus::Failed, message).await
    }

    /// Deadline outcome: same tenant consequence as failure, distinct status
    #[instrument(skip(conn, message))]
    pub async fn timeout_job(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        tenant_id: Uuid,
        message: &str,
    ) -> Result<(), JobError> {
        Self::terminate(conn, job_id, tenant_id, JobStatus::TimedOut, message).await
    }

    async fn terminate(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        tenant_id: Uuid,
        terminal: JobStatus,
        message: &str,
    ) -> Result<(), JobError> {
        let message = message.to_string();

        conn.build_transaction()
            .run::<_, JobError, _>(|conn| {
                Box::pin(async move {
                    TenantJob::set_terminal(conn, job_id, terminal, Some(&message)).await?;
                    Tenant::set_status(conn, tenant_id, TenantStatus::Suspended).await?;
                    Ok(())
                })
            })
            .await?;

        info!(
            "Job {} marked {} and tenant {} suspended",
            job_id,
            terminal.as_str(),
            tenant_id
        );
        Ok(())
    }

    /// Terminal bookkeeping only; tenant activation is itself a pipeline step,
    /// so completion never touches tenant status
    pub async fn complete_job(conn: &mut AsyncPgConnection, job_id: Uuid) -> Result<(), JobError> {
        TenantJob::set_terminal(conn, job_id, JobStatus::Completed, None).await?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
