use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::services::policy::BackoffStrategy;

/// Job status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in queue
    Pending,
    /// Job is currently being processed
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed (may be retried)
    Failed,
    /// Job failed permanently (max retries exceeded)
    Dead,
    /// Job was cancelled by user
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Dead | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Dead => "dead",
            Self::Cancelled => "cancelled",
        }
    }
}

/// What a run executes: either whole suites or bare endpoints (the
/// latter are synthesized into one single-step case each)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    SuiteIds(Vec<Uuid>),
    EndpointIds { service_id: Uuid, ids: Vec<Uuid> },
}

/// Per-run execution options; unset fields fall back to `Config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Per-step wall-clock budget in seconds
    pub step_timeout_seconds: Option<u64>,
    /// Retry attempts for transport-class step errors
    pub max_step_retries: Option<u32>,
    pub backoff_strategy: Option<BackoffStrategy>,
    /// Bounded concurrency across cases
    pub worker_pool_size: Option<usize>,
    /// Stop executing a case after the first assertion failure
    #[serde(default)]
    pub halt_on_failure: bool,
    /// Opaque bearer token injected as an Authorization header
    pub auth_token: Option<String>,
    /// Extra headers injected into every request
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
}

impl RunOptions {
    pub fn step_timeout(&self, default: Duration) -> Duration {
        self.step_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(default)
    }
}

/// Run job submitted to the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunJob {
    /// Unique job identifier
    pub id: Uuid,

    /// The TestRun this job executes
    pub run_id: Uuid,

    /// What to execute
    pub trigger: RunTrigger,

    /// Target base URL
    pub base_url: String,

    /// Current status
    pub status: JobStatus,

    /// Execution options
    pub options: RunOptions,

    /// Retry information (for the job itself, not for steps)
    pub retry_count: u32,
    pub max_retries: u32,

    /// Timestamps
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,

    /// Error message if failed
    pub error_message: Option<String>,

    /// Summary recorded when the job completed
    pub result: Option<RunJobResult>,
}

impl RunJob {
    /// A run has exactly one job; the job id is derived from the run id
    /// so holders of a run id can address its job without a lookup.
    pub fn id_for(run_id: Uuid) -> Uuid {
        Uuid::new_v5(&run_id, b"job")
    }

    pub fn new(run_id: Uuid, trigger: RunTrigger, base_url: String, options: RunOptions) -> Self {
        Self {
            id: Self::id_for(run_id),
            run_id,
            trigger,
            base_url,
            status: JobStatus::Pending,
            options,
            retry_count: 0,
            max_retries: 3,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            completed_at: None,
            error_message: None,
            result: None,
        }
    }
}

/// Result of job execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunJobResult {
    pub run_id: Uuid,
    pub total_cases: usize,
    pub cases_passed: usize,
    pub cases_failed: usize,
    pub pass_rate: f64,
    pub total_duration_ms: i64,
}
