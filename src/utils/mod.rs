// Utility modules for Tessera Backend

pub mod launch_errors;
pub mod metrics;
pub mod slug_validator;

pub use launch_errors::{LaunchError, LaunchErrorResponse, LaunchResult};
pub use metrics::{new_shared_metrics, LaunchMetrics, MetricsRegistry, SharedMetrics};
pub use slug_validator::SlugValidator;
