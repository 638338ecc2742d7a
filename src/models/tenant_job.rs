// Tenant Job Database Model
// TES-72: Provisioning runs and their per-step progress

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::tenant::TenantProjection;
use crate::schema::tenant_jobs;

// =============================================================================
// ENUMS
// =============================================================================

/// Kind of work a job performs. Only `Launch` is executed today; the other
/// variants reserve names for runs the dashboard will trigger later.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Launch,
    UpdateKeys,
    AddDomain,
    Upgrade,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Launch => "launch",
            JobType::UpdateKeys => "update_keys",
            JobType::AddDomain => "add_domain",
            JobType::Upgrade => "upgrade",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launch" => Ok(JobType::Launch),
            "update_keys" => Ok(JobType::UpdateKeys),
            "add_domain" => Ok(JobType::AddDomain),
            "upgrade" => Ok(JobType::Upgrade),
            _ => Err(format!("Unknown job type: {}", s)),
        }
    }
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        }
    }

    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "timed_out" => Ok(JobStatus::TimedOut),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Status of a single step inside a job's `steps` array
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::TimedOut
        )
    }
}

// =============================================================================
// STEP AGGREGATE
// =============================================================================

/// One unit of orchestration work, stored inside the job's jsonb `steps`
/// array. Steps are not rows: the whole array is read, mutated at one index,
/// and written back — safe because each job has exactly one writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct JobStep {
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl JobStep {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Advance this step's status.
    ///
    /// `started_at` is stamped once on leaving `pending` and never moves
    /// again; `completed_at` is stamped on entering a terminal status.
    /// Transitions back to `pending` are ignored — step status is monotonic
    /// within a run.
    pub fn advance(&mut self, new_status: StepStatus, error: Option<String>) {
        if new_status == StepStatus::Pending {
            return;
        }

        let now = Utc::now();
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if new_status.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = new_status;
        if let Some(message) = error {
            self.error = Some(message);
        }
    }
}

// =============================================================================
// DATABASE MODELS
// =============================================================================

/// Tenant job database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tenant_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TenantJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub steps: Value,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New job row for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = tenant_jobs)]
pub struct NewTenantJob {
    pub tenant_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub steps: Value,
}

#[derive(thiserror::Error, Debug)]
pub enum TenantJobError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Job not found")]
    NotFound,

    #[error("Corrupt steps payload: {0}")]
    Steps(#[from] serde_json::Error),
}

impl TenantJob {
    /// Insert a new job
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_job: NewTenantJob,
    ) -> Result<Self, TenantJobError> {
        use crate::schema::tenant_jobs::dsl::*;

        diesel::insert_into(tenant_jobs)
            .values(&new_job)
            .get_result::<TenantJob>(conn)
            .await
            .map_err(TenantJobError::Database)
    }

    /// Find job by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
    ) -> Result<Self, TenantJobError> {
        use crate::schema::tenant_jobs::dsl::*;

        tenant_jobs
            .filter(id.eq(job_id))
            .first::<TenantJob>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantJobError::NotFound,
                _ => TenantJobError::Database(e),
            })
    }

    /// Most recent job for a tenant, newest first
    pub async fn list_for_tenant(
        conn: &mut AsyncPgConnection,
        tenant: Uuid,
    ) -> Result<Vec<Self>, TenantJobError> {
        use crate::schema::tenant_jobs::dsl::*;

        tenant_jobs
            .filter(tenant_id.eq(tenant))
            .order(created_at.desc())
            .load::<TenantJob>(conn)
            .await
            .map_err(TenantJobError::Database)
    }

    /// Replace the whole steps array
    pub async fn write_steps(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        new_steps: &[JobStep],
    ) -> Result<Self, TenantJobError> {
        use crate::schema::tenant_jobs::dsl::*;

        let payload = serde_json::to_value(new_steps)?;

        diesel::update(tenant_jobs.filter(id.eq(job_id)))
            .set((steps.eq(payload), updated_at.eq(Utc::now())))
            .get_result::<TenantJob>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantJobError::NotFound,
                _ => TenantJobError::Database(e),
            })
    }

    /// Write a terminal status with `completed_at` and an optional message
    pub async fn set_terminal(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        terminal: JobStatus,
        message: Option<&str>,
    ) -> Result<Self, TenantJobError> {
        use crate::schema::tenant_jobs::dsl::*;

        let now = Utc::now();
        diesel::update(tenant_jobs.filter(id.eq(job_id)))
            .set((
                status.eq(terminal.as_str()),
                error_message.eq(message),
                completed_at.eq(Some(now)),
                updated_at.eq(now),
            ))
            .get_result::<TenantJob>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => TenantJobError::NotFound,
                _ => TenantJobError::Database(e),
            })
    }

    /// Parse the jsonb steps aggregate
    pub fn parse_steps(&self) -> Result<Vec<JobStep>, TenantJobError> {
        serde_json::from_value(self.steps.clone()).map_err(TenantJobError::Steps)
    }

    pub fn status_enum(&self) -> JobStatus {
        JobStatus::from_str(&self.status).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid job status '{}' for job {}, treating as Failed: {}",
                self.status,
                self.id,
                e
            );
            JobStatus::Failed
        })
    }

    pub fn job_type_enum(&self) -> Option<JobType> {
        JobType::from_str(&self.job_type).ok()
    }
}

// =============================================================================
// RESPONSE DTOs
// =============================================================================

/// Poll response for `GET /v1/tenants/jobs/{job_id}`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub tenant_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub steps: Vec<JobStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub tenant: TenantProjection,
}

impl JobStatusResponse {
    pub fn from_parts(
        job: &TenantJob,
        steps: Vec<JobStep>,
        tenant: TenantProjection,
    ) -> Self {
        Self {
            job_id: job.id,
            tenant_id: job.tenant_id,
            job_type: job.job_type.clone(),
            status: job.status.clone(),
            steps,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
            tenant,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::TimedOut,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(JobStatus::from_str("cancelled").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
    }

    #[test]
    fn test_job_type_round_trip() {
        for job_type in [
            JobType::Launch,
            JobType::UpdateKeys,
            JobType::AddDomain,
            JobType::Upgrade,
        ] {
            assert_eq!(JobType::from_str(job_type.as_str()), Ok(job_type));
        }
    }

    #[test]
    fn test_advance_stamps_started_at_once() {
        let mut step = JobStep::pending("create database");
        assert!(step.started_at.is_none());

        step.advance(StepStatus::Running, None);
        let first_start = step.started_at;
        assert!(first_start.is_some());
        assert!(step.completed_at.is_none());

        step.advance(StepStatus::Completed, None);
        assert_eq!(step.started_at, first_start);
        assert!(step.completed_at.is_some());
        assert_eq!(step.status, StepStatus::Completed);
    }

    #[test]
    fn test_advance_ignores_regression_to_pending() {
        let mut step = JobStep::pending("run migrations");
        step.advance(StepStatus::Running, None);

        step.advance(StepStatus::Pending, None);
        assert_eq!(step.status, StepStatus::Running);
    }

    #[test]
    fn test_advance_attaches_error_on_failure() {
        let mut step = JobStep::pending("configure domain");
        step.advance(StepStatus::Running, None);
        step.advance(StepStatus::Failed, Some("registrar rejected hostname".to_string()));

        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(
            step.error.as_deref(),
            Some("registrar rejected hostname")
        );
        assert!(step.completed_at.is_some());
    }

    #[test]
    fn test_timed_out_step_stamps_start_even_if_never_ran() {
        // A deadline can expire before the running write lands; the step
        // still gets a coherent start/end pair.
        let mut step = JobStep::pending("seed configuration");
        step.advance(StepStatus::TimedOut, Some("deadline exceeded".to_string()));

        assert!(step.started_at.is_some());
        assert!(step.completed_at.is_some());
        assert_eq!(step.status, StepStatus::TimedOut);
    }

    #[test]
    fn test_steps_serde_round_trip() {
        let mut steps = vec![
            JobStep::pending("create database"),
            JobStep::pending("run migrations"),
        ];
        steps[0].advance(StepStatus::Running, None);
        steps[0].advance(StepStatus::Completed, None);

        let value = serde_json::to_value(&steps).unwrap();
        let parsed: Vec<JobStep> = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, steps);
        assert_eq!(parsed[0].status, StepStatus::Completed);
        assert_eq!(parsed[1].status, StepStatus::Pending);
    }

    #[test]
    fn test_step_serializes_in_snake_case() {
        let mut step = JobStep::pending("activate");
        step.advance(StepStatus::TimedOut, None);

        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["status"], "timed_out");
        assert_eq!(value["name"], "activate");
    }
}
