use std::collections::HashMap;
use std::time::Instant;

use reqwest::{Client, Method};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CaseStatus, StepResult, StepStatus, TestCase, TestCaseResult, TestStep};
use crate::services::policy::{RetryPolicy, TimeoutPolicy};
use crate::services::vars;

/// Per-case execution context. The variable table lives inside
/// `execute_case` and is never shared across cases; everything here is
/// read-only configuration plus the run-scoped cancellation signal.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub base_url: String,
    pub retry: RetryPolicy,
    pub timeout: TimeoutPolicy,
    /// Stop executing a case after the first assertion failure
    pub halt_on_failure: bool,
    pub auth_token: Option<String>,
    pub custom_headers: HashMap<String, String>,
    pub cancel: watch::Receiver<bool>,
}

impl ExecutionContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
            timeout: TimeoutPolicy::default(),
            halt_on_failure: false,
            auth_token: None,
            custom_headers: HashMap::new(),
            cancel: rx,
        }
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// How a single step concluded, before being folded into the case result
enum StepOutcome {
    /// Call completed; assertion verdict captured in the result
    Completed(StepResult),
    /// Transport-level error after exhausting retries; remaining steps
    /// of the case must be skipped
    Halted(StepResult),
    /// Deterministic step error (bad method, unresolved variable)
    Errored(StepResult),
}

/// Sequential chain executor: one case at a time, one step at a time,
/// feeding extracted variables forward.
pub struct TestExecutionEngine {
    client: Client,
}

impl TestExecutionEngine {
    pub fn new() -> AppResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Execute every step of a case in ascending sequence order.
    ///
    /// Assertion failures do not stop the chain (unless configured to);
    /// transport errors and cancellation skip the remaining steps. This
    /// never returns an error: whatever happens, the caller gets a
    /// terminal `TestCaseResult`.
    pub async fn execute_case(
        &self,
        case: &TestCase,
        steps: &[TestStep],
        ctx: &ExecutionContext,
    ) -> TestCaseResult {
        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();

        let mut ordered: Vec<&TestStep> = steps.iter().collect();
        ordered.sort_by_key(|s| s.sequence);

        // Sequence ties are illegal; refuse to guess an order
        if ordered.windows(2).any(|w| w[0].sequence == w[1].sequence) {
            let step_results = ordered
                .iter()
                .map(|s| StepResult::skipped(s.id, s.sequence))
                .collect();
            return TestCaseResult {
                id: Uuid::new_v4(),
                run_id: Uuid::nil(),
                case_id: case.id,
                case_name: case.name.clone(),
                status: CaseStatus::Error,
                error_message: Some("Duplicate step sequence in case".to_string()),
                step_results,
                started_at,
                duration_ms: start.elapsed().as_millis() as i64,
            };
        }

        let mut variables: HashMap<String, Value> = HashMap::new();
        let mut step_results: Vec<StepResult> = Vec::with_capacity(ordered.len());
        let mut halted = false;
        let mut cancelled = false;
        let mut error_message: Option<String> = None;

        for step in &ordered {
            if ctx.cancelled() {
                cancelled = true;
            }
            if halted || cancelled {
                step_results.push(StepResult::skipped(step.id, step.sequence));
                continue;
            }

            match self.execute_step(step, &mut variables, ctx).await {
                StepOutcome::Completed(result) => {
                    if !result.passed && ctx.halt_on_failure {
                        halted = true;
                    }
                    step_results.push(result);
                }
                StepOutcome::Errored(result) => {
                    if error_message.is_none() {
                        error_message = result
                            .error_message
                            .as_ref()
                            .map(|m| format!("step {}: {}", step.sequence, m));
                    }
                    step_results.push(result);
                }
                StepOutcome::Halted(result) => {
                    if error_message.is_none() {
                        error_message = result
                            .error_message
                            .as_ref()
                            .map(|m| format!("step {}: {}", step.sequence, m));
                    }
                    step_results.push(result);
                    halted = true;
                }
            }
        }

        if cancelled && error_message.is_none() {
            error_message = Some("Run cancelled before case completed".to_string());
        }

        let status = Self::aggregate_status(&step_results);
        tracing::debug!(
            case_id = %case.id,
            status = status.as_str(),
            steps = step_results.len(),
            "Case execution finished"
        );

        TestCaseResult {
            id: Uuid::new_v4(),
            run_id: Uuid::nil(), // stamped by the caller that owns the run
            case_id: case.id,
            case_name: case.name.clone(),
            status,
            error_message,
            step_results,
            started_at,
            duration_ms: start.elapsed().as_millis() as i64,
        }
    }

    /// Case status is an aggregate over its steps: Error dominates,
    /// then Failed; a case whose every step was skipped is Skipped.
    fn aggregate_status(step_results: &[StepResult]) -> CaseStatus {
        let executed: Vec<&StepResult> = step_results
            .iter()
            .filter(|r| r.status != StepStatus::Skipped)
            .collect();

        if step_results.iter().any(|r| r.status == StepStatus::Error) {
            CaseStatus::Error
        } else if step_results.iter().any(|r| r.status == StepStatus::Failed) {
            CaseStatus::Failed
        } else if executed.is_empty() {
            CaseStatus::Skipped
        } else {
            CaseStatus::Passed
        }
    }

    async fn execute_step(
        &self,
        step: &TestStep,
        variables: &mut HashMap<String, Value>,
        ctx: &ExecutionContext,
    ) -> StepOutcome {
        let start = Instant::now();

        // Resolve placeholders before touching the network; an
        // unresolved variable is a deterministic, non-halting error
        let prepared = match self.prepare_request(step, variables, ctx) {
            Ok(prepared) => prepared,
            Err(e) => {
                return StepOutcome::Errored(Self::error_result(step, start, &e));
            }
        };

        // Retry loop: transport-class errors only
        let mut attempt: u32 = 0;
        let mut last_attempt_ms: i64 = 0;
        let response = loop {
            let attempt_start = Instant::now();
            let outcome = self.send(&prepared, ctx).await;
            last_attempt_ms = attempt_start.elapsed().as_millis() as i64;
            match outcome {
                Ok(response) => break Ok(response),
                Err(e) if e.is_transport() && attempt < ctx.retry.max_retries => {
                    attempt += 1;
                    let delay = ctx.retry.delay_for(attempt);
                    tracing::debug!(
                        step_id = %step.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transport error, retrying"
                    );
                    // Cancellation abandons further retries
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancelled_signal(ctx.cancel.clone()) => break Err(e),
                    }
                }
                Err(e) => break Err(e),
            }
        };

        match response {
            Ok((status_code, body)) => {
                // Wrong status is Failed, never Error: the call
                // succeeded, the contract did not
                let passed = status_code == step.expected_status;
                let error_message = (!passed).then(|| {
                    format!(
                        "Expected status {}, got {}",
                        step.expected_status, status_code
                    )
                });

                let extracted = Self::apply_extract_rules(step, &body);
                for (name, value) in &extracted {
                    variables.insert(name.clone(), value.clone());
                }

                StepOutcome::Completed(StepResult {
                    id: Uuid::new_v4(),
                    step_id: step.id,
                    sequence: step.sequence,
                    status: if passed {
                        StepStatus::Passed
                    } else {
                        StepStatus::Failed
                    },
                    status_code: Some(status_code),
                    passed,
                    response_time_ms: Some(last_attempt_ms),
                    response_body: Some(body),
                    extracted_values: extracted,
                    error_message,
                    error_kind: None,
                })
            }
            Err(e) if e.is_transport() => {
                StepOutcome::Halted(Self::error_result(step, start, &e))
            }
            Err(e) => StepOutcome::Errored(Self::error_result(step, start, &e)),
        }
    }

    fn error_result(step: &TestStep, start: Instant, error: &AppError) -> StepResult {
        StepResult {
            id: Uuid::new_v4(),
            step_id: step.id,
            sequence: step.sequence,
            status: StepStatus::Error,
            status_code: None,
            passed: false,
            response_time_ms: Some(start.elapsed().as_millis() as i64),
            response_body: None,
            extracted_values: HashMap::new(),
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    fn prepare_request(
        &self,
        step: &TestStep,
        variables: &HashMap<String, Value>,
        ctx: &ExecutionContext,
    ) -> AppResult<PreparedRequest> {
        let method = match step.method.to_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            other => {
                return Err(AppError::Validation(format!(
                    "Unsupported HTTP method: {}",
                    other
                )))
            }
        };

        let path = vars::substitute_path(&step.path, variables)?;
        let url = format!("{}{}", ctx.base_url.trim_end_matches('/'), path);

        let mut headers: Vec<(String, String)> = Vec::new();
        if let Some(token) = &ctx.auth_token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        for (key, value) in &ctx.custom_headers {
            headers.push((key.clone(), value.clone()));
        }
        for (key, value) in &step.headers {
            headers.push((key.clone(), vars::substitute_string(value, variables)?));
        }

        let mut query: Vec<(String, String)> = Vec::new();
        for (key, value) in &step.query_params {
            query.push((key.clone(), vars::substitute_string(value, variables)?));
        }

        let body = match &step.body {
            Some(body) => Some(vars::substitute_value(body, variables)?),
            None => None,
        };

        Ok(PreparedRequest {
            method,
            url,
            headers,
            query,
            body,
        })
    }

    async fn send(
        &self,
        prepared: &PreparedRequest,
        ctx: &ExecutionContext,
    ) -> AppResult<(u16, Value)> {
        let mut request = self
            .client
            .request(prepared.method.clone(), &prepared.url)
            .timeout(ctx.timeout.duration);

        for (key, value) in &prepared.headers {
            request = request.header(key, value);
        }
        if !prepared.query.is_empty() {
            request = request.query(&prepared.query);
        }
        if let Some(body) = &prepared.body {
            request = request.json(body);
        }

        let response = tokio::select! {
            response = request.send() => response.map_err(AppError::from)?,
            _ = cancelled_signal(ctx.cancel.clone()) => {
                return Err(AppError::Transport("Request abandoned: run cancelled".to_string()));
            }
        };

        let status = response.status().as_u16();
        // Non-JSON bodies are kept as Null; extraction simply finds nothing
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    /// Evaluate each extract rule against the response body. A rule that
    /// resolves nothing omits its variable instead of failing the step;
    /// the failure surfaces later, at substitution time, where it is
    /// attributable to the right step.
    fn apply_extract_rules(step: &TestStep, body: &Value) -> HashMap<String, Value> {
        let mut extracted = HashMap::new();
        for (name, expr) in &step.extract_rules {
            match vars::evaluate_jsonpath(expr, body) {
                Some(value) => {
                    extracted.insert(name.clone(), value);
                }
                None => {
                    tracing::debug!(
                        step_id = %step.id,
                        variable = %name,
                        expr = %expr,
                        "Extract rule matched nothing, variable omitted"
                    );
                }
            }
        }
        extracted
    }
}

/// Resolves when the cancellation flag flips to true. A closed channel
/// (sender dropped) means cancellation can never arrive, so the future
/// stays pending instead of firing spuriously.
async fn cancelled_signal(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

struct PreparedRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<Value>,
}
