use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CaseStatus, RunSummary, StepStatus, TestCaseResult};
use crate::repositories::ResultStore;

/// Rolls StepResult -> TestCaseResult -> TestRun tallies. Read-only and
/// idempotent: recomputable at any time from persisted results.
pub struct ResultAggregator;

impl ResultAggregator {
    pub async fn summarize(store: &dyn ResultStore, run_id: Uuid) -> AppResult<RunSummary> {
        let case_results = store.list_case_results(run_id).await?;
        let mut summary = Self::summarize_results(&case_results);
        summary.run_id = Some(run_id);
        Ok(summary)
    }

    pub fn summarize_results(case_results: &[TestCaseResult]) -> RunSummary {
        let mut summary = RunSummary {
            total_cases: case_results.len(),
            ..RunSummary::default()
        };

        let mut time_sum: i64 = 0;
        let mut time_count: usize = 0;

        for case in case_results {
            match case.status {
                CaseStatus::Passed => summary.cases_passed += 1,
                CaseStatus::Failed => summary.cases_failed += 1,
                CaseStatus::Error => summary.cases_errored += 1,
                CaseStatus::Skipped => summary.cases_skipped += 1,
            }
            for step in &case.step_results {
                summary.total_steps += 1;
                match step.status {
                    StepStatus::Passed => summary.steps_passed += 1,
                    StepStatus::Failed => summary.steps_failed += 1,
                    StepStatus::Error => summary.steps_errored += 1,
                    StepStatus::Skipped => summary.steps_skipped += 1,
                }
                if let Some(ms) = step.response_time_ms {
                    time_sum += ms;
                    time_count += 1;
                }
            }
        }

        if time_count > 0 {
            summary.avg_response_time_ms = Some(time_sum as f64 / time_count as f64);
        }
        summary.pass_rate = if summary.total_cases > 0 {
            (summary.cases_passed as f64 / summary.total_cases as f64) * 100.0
        } else {
            0.0
        };
        summary
    }
}
