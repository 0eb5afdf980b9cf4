use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ErrorKind;

/// Status of a whole test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Terminal status of a case within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// Terminal status of a single step execution. `Skipped` marks steps
/// never reached because an earlier step's HTTP call errored out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

/// One execution attempt of one or more suites against a target base URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: Uuid,
    pub base_url: String,
    pub status: RunStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    /// Set when infrastructure failure aborted the run
    pub error_message: Option<String>,
}

impl TestRun {
    pub fn new(base_url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            base_url,
            status: RunStatus::Running,
            started_at: OffsetDateTime::now_utc(),
            finished_at: None,
            error_message: None,
        }
    }
}

/// Outcome of one case within one run. Owns its step results; this is a
/// durable snapshot, never a live view of the case definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub id: Uuid,
    pub run_id: Uuid,
    pub case_id: Uuid,
    pub case_name: String,
    pub status: CaseStatus,
    pub error_message: Option<String>,
    pub step_results: Vec<StepResult>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub duration_ms: i64,
}

/// Outcome of one step execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub id: Uuid,
    pub step_id: Uuid,
    pub sequence: i32,
    pub status: StepStatus,
    /// HTTP status received, absent when the call never completed
    pub status_code: Option<u16>,
    pub passed: bool,
    /// Wall-clock time of the final attempt, absent for skipped steps
    pub response_time_ms: Option<i64>,
    pub response_body: Option<serde_json::Value>,
    /// Variables actually captured by this step's extract rules
    #[serde(default)]
    pub extracted_values: HashMap<String, serde_json::Value>,
    pub error_message: Option<String>,
    /// Classifies `error_message` without string matching; absent when
    /// the step passed or only the status assertion failed
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
}

impl StepResult {
    /// Placeholder result for a step never reached
    pub fn skipped(step_id: Uuid, sequence: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_id,
            sequence,
            status: StepStatus::Skipped,
            status_code: None,
            passed: false,
            response_time_ms: None,
            response_body: None,
            extracted_values: HashMap::new(),
            error_message: None,
            error_kind: None,
        }
    }
}

/// Aggregate tallies over one run, recomputable at any time from the
/// persisted results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Option<Uuid>,
    pub total_cases: usize,
    pub cases_passed: usize,
    pub cases_failed: usize,
    pub cases_errored: usize,
    pub cases_skipped: usize,
    pub total_steps: usize,
    pub steps_passed: usize,
    pub steps_failed: usize,
    pub steps_errored: usize,
    pub steps_skipped: usize,
    /// Mean over step results that recorded a response time
    pub avg_response_time_ms: Option<f64>,
    pub pass_rate: f64,
}
