use std::collections::HashSet;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{RunStatus, TestCase, TestStep};
use crate::queue::{RunJob, RunJobResult, RunTrigger};
use crate::services::chain::single_step_for;
use crate::services::policy::{RetryPolicy, TimeoutPolicy};
use crate::services::{ExecutionContext, ResultAggregator, TestExecutionEngine};
use crate::state::AppState;

/// Executes one run job: loads the workload, fans the cases out over a
/// bounded pool and appends each case result as it completes.
pub struct RunExecutor {
    state: AppState,
    engine: TestExecutionEngine,
}

impl RunExecutor {
    pub fn new(state: AppState) -> AppResult<Self> {
        let engine = TestExecutionEngine::new()?;
        Ok(Self { state, engine })
    }

    pub async fn execute(&self, job: RunJob) -> AppResult<RunJobResult> {
        let start = Instant::now();
        let run_id = job.run_id;
        let cancel = self.state.cancellations.register(run_id);

        let retry = RetryPolicy {
            strategy: job
                .options
                .backoff_strategy
                .unwrap_or(self.state.config.backoff_strategy),
            max_retries: job
                .options
                .max_step_retries
                .unwrap_or(self.state.config.max_retries),
            base_delay: self.state.config.retry_base_delay,
        };
        let ctx = ExecutionContext {
            base_url: job.base_url.clone(),
            retry,
            timeout: TimeoutPolicy {
                duration: job.options.step_timeout(self.state.config.step_timeout),
            },
            halt_on_failure: job.options.halt_on_failure,
            auth_token: job.options.auth_token.clone(),
            custom_headers: job.options.custom_headers.clone(),
            cancel,
        };

        let workload = self.load_workload(&job).await?;
        let total_cases = workload.len();

        // A requeued job re-executes the run; cases that already have a
        // recorded result keep it and are not run again.
        let recorded: HashSet<Uuid> = self
            .state
            .results
            .list_case_results(run_id)
            .await?
            .into_iter()
            .map(|r| r.case_id)
            .collect();
        let workload: Vec<_> = workload
            .into_iter()
            .filter(|(case, _)| !recorded.contains(&case.id))
            .collect();

        let pool_size = job
            .options
            .worker_pool_size
            .unwrap_or(self.state.config.worker_pool_size)
            .max(1);

        // Sequential within a case, concurrent across cases. Each case
        // result has exactly one writer: the future that produced it.
        let outcomes: Vec<AppResult<()>> = stream::iter(workload)
            .map(|(case, steps)| {
                let ctx = ctx.clone();
                async move {
                    let mut result = self.engine.execute_case(&case, &steps, &ctx).await;
                    result.run_id = run_id;
                    self.state.results.append_case_result(result).await
                }
            })
            .buffer_unordered(pool_size)
            .collect()
            .await;

        for outcome in outcomes {
            outcome.map_err(|e| AppError::Persistence(e.to_string()))?;
        }

        let summary = ResultAggregator::summarize(self.state.results.as_ref(), run_id).await?;
        Ok(RunJobResult {
            run_id,
            total_cases,
            cases_passed: summary.cases_passed,
            cases_failed: summary.cases_failed + summary.cases_errored,
            pass_rate: summary.pass_rate,
            total_duration_ms: start.elapsed().as_millis() as i64,
        })
    }

    /// Resolve the job's trigger into concrete (case, steps) pairs
    async fn load_workload(&self, job: &RunJob) -> AppResult<Vec<(TestCase, Vec<TestStep>)>> {
        match &job.trigger {
            RunTrigger::SuiteIds(suite_ids) => {
                let mut workload = Vec::new();
                for suite_id in suite_ids {
                    let suite = self.state.suites.get_suite(*suite_id).await?;
                    for case in self.state.suites.list_cases(suite.id).await? {
                        let steps = self.state.suites.list_steps(case.id).await?;
                        workload.push((case, steps));
                    }
                }
                Ok(workload)
            }
            RunTrigger::EndpointIds { ids, .. } => {
                // Bare endpoints become one synthesized single-step case
                // each. The case id is derived from the run and endpoint
                // so a requeued job resolves to the same cases.
                let mut workload = Vec::new();
                for endpoint_id in ids {
                    let endpoint = self.state.catalog.get(*endpoint_id).await?;
                    let now = OffsetDateTime::now_utc();
                    let case = TestCase {
                        id: Uuid::new_v5(&job.run_id, endpoint_id.as_bytes()),
                        suite_id: Uuid::nil(),
                        name: format!("{} {}", endpoint.method, endpoint.path),
                        description: None,
                        error_type: None,
                        created_at: now,
                        updated_at: now,
                    };
                    let step = TestStep::new(case.id, single_step_for(&endpoint));
                    workload.push((case, vec![step]));
                }
                Ok(workload)
            }
        }
    }
}

/// Finalizes run records once the executor is done with them
pub struct ResultHandler;

impl ResultHandler {
    /// Every case result is terminal, so the run is complete even when
    /// cases inside it failed, errored or were cancelled mid-flight.
    pub async fn complete_run(state: &AppState, result: &RunJobResult) -> AppResult<()> {
        state
            .results
            .finish_run(result.run_id, RunStatus::Completed, None)
            .await?;
        state.cancellations.remove(result.run_id);

        tracing::info!(
            run_id = %result.run_id,
            total = result.total_cases,
            passed = result.cases_passed,
            failed = result.cases_failed,
            pass_rate = result.pass_rate,
            "Run completed"
        );
        Ok(())
    }

    /// Infrastructure failure: the run itself is marked failed, but
    /// whatever results were appended stay inspectable.
    pub async fn fail_run(state: &AppState, run_id: Uuid, error: String) -> AppResult<()> {
        state
            .results
            .finish_run(run_id, RunStatus::Failed, Some(error.clone()))
            .await?;
        state.cancellations.remove(run_id);

        tracing::error!(run_id = %run_id, error = %error, "Run failed");
        Ok(())
    }
}
