// TES-79: Prometheus metrics for the launch pipeline
// Exported in text format through GET /metrics

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;

/// Step durations span network calls and remote migrations, so buckets run
/// from sub-second to the five-minute deadline.
const STEP_DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 5.0, 15.0, 60.0, 120.0, 300.0];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

/// Counters and histograms for provisioning runs.
///
/// All metrics use interior mutability; the struct is cheap to clone and
/// safe to share across tasks.
#[derive(Clone)]
pub struct LaunchMetrics {
    /// Jobs started, labelled by job type
    jobs_started_total: CounterVec,

    /// Jobs reaching a terminal status, labelled by outcome
    jobs_finished_total: CounterVec,

    /// Wall time of each pipeline step, labelled by step name
    step_duration_seconds: HistogramVec,

    /// Key validation calls, labelled by kind and outcome
    key_validations_total: CounterVec,
}

impl LaunchMetrics {
    pub fn new(registry: &Registry) -> Result<Self, MetricsError> {
        let jobs_started_total = CounterVec::new(
            Opts::new("tessera_jobs_started_total", "Provisioning jobs started"),
            &["job_type"],
        )?;
        registry.register(Box::new(jobs_started_total.clone()))?;

        let jobs_finished_total = CounterVec::new(
            Opts::new(
                "tessera_jobs_finished_total",
                "Provisioning jobs reaching a terminal status",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(jobs_finished_total.clone()))?;

        let step_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tessera_step_duration_seconds",
                "Wall time of each launch pipeline step",
            )
            .buckets(STEP_DURATION_BUCKETS.to_vec()),
            &["step"],
        )?;
        registry.register(Box::new(step_duration_seconds.clone()))?;

        let key_validations_total = CounterVec::new(
            Opts::new(
                "tessera_key_validations_total",
                "External credential validation calls",
            ),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(key_validations_total.clone()))?;

        Ok(Self {
            jobs_started_total,
            jobs_finished_total,
            step_duration_seconds,
            key_validations_total,
        })
    }

    pub fn job_started(&self, job_type: &str) {
        self.jobs_started_total
            .with_label_values(&[job_type])
            .inc();
    }

    /// Record a terminal job outcome ("completed", "failed", "timed_out")
    pub fn job_finished(&self, outcome: &str) {
        self.jobs_finished_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn observe_step(&self, step: &str, seconds: f64) {
        self.step_duration_seconds
            .with_label_values(&[step])
            .observe(seconds);
    }

    pub fn key_validated(&self, kind: &str, valid: bool) {
        let outcome = if valid { "valid" } else { "invalid" };
        self.key_validations_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Counter value for tests
    pub fn finished_count(&self, outcome: &str) -> f64 {
        self.jobs_finished_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Counter value for tests
    pub fn started_count(&self, job_type: &str) -> f64 {
        self.jobs_started_total
            .with_label_values(&[job_type])
            .get()
    }
}

/// Owns the Prometheus registry plus every metric family this service
/// records; the `/metrics` handler calls `encode_text`.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    launch: LaunchMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let launch = LaunchMetrics::new(&registry)?;
        Ok(Self { registry, launch })
    }

    pub fn launch(&self) -> &LaunchMetrics {
        &self.launch
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}

pub type SharedMetrics = Arc<MetricsRegistry>;

pub fn new_shared_metrics() -> Result<SharedMetrics, MetricsError> {
    Ok(Arc::new(MetricsRegistry::new()?))
}
