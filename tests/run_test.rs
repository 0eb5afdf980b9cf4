mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use chainrun::error::{AppError, AppResult};
use chainrun::models::{CaseStatus, Endpoint, RunStatus, StepStatus, TestCaseResult, TestRun};
use chainrun::queue::{JobQueue, RunOptions, RunTrigger};
use chainrun::repositories::{InMemoryStore, ResultStore};
use chainrun::services::runner::{ResultHandler, RunExecutor};
use chainrun::services::{RunScheduler, TriggerRequest};

use common::{Factory, MockTarget, TestApp};

fn scheduler(app: &TestApp) -> RunScheduler {
    RunScheduler::new(
        app.state.results.clone(),
        app.state.job_queue.clone(),
        app.state.cancellations.clone(),
    )
}

#[tokio::test]
async fn test_triggered_run_executes_and_completes() {
    let app = TestApp::new();
    let factory = Factory::new(&app.state);
    let target = MockTarget::spawn().await;

    let suite = factory.create_suite(Uuid::new_v4()).await;
    factory.create_user_chain(suite.id).await;
    let failing = factory.create_case(suite.id).await;
    factory
        .create_step(failing.id, 0, "GET", "/users/999", 200)
        .await;

    let run_id = scheduler(&app)
        .trigger(TriggerRequest {
            trigger: RunTrigger::SuiteIds(vec![suite.id]),
            base_url: target.base_url.clone(),
            options: RunOptions::default(),
        })
        .await
        .unwrap();

    // Trigger only records and enqueues; nothing has executed yet
    let run = app.state.results.get_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(app
        .state
        .results
        .list_case_results(run_id)
        .await
        .unwrap()
        .is_empty());

    let job = app.state.job_queue.dequeue(1).await.unwrap().unwrap();
    let executor = RunExecutor::new(app.state.clone()).unwrap();
    let result = executor.execute(job).await.unwrap();

    assert_eq!(result.run_id, run_id);
    assert_eq!(result.total_cases, 2);
    assert_eq!(result.cases_passed, 1);
    assert_eq!(result.cases_failed, 1);

    ResultHandler::complete_run(&app.state, &result).await.unwrap();

    let run = app.state.results.get_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let case_results = app.state.results.list_case_results(run_id).await.unwrap();
    assert_eq!(case_results.len(), 2);
    assert!(case_results.iter().all(|r| r.run_id == run_id));
}

#[tokio::test]
async fn test_endpoint_trigger_synthesizes_single_step_cases() {
    let app = TestApp::new();
    let target = MockTarget::spawn().await;

    let service_id = Uuid::new_v4();
    let health = Endpoint {
        id: Uuid::new_v5(&service_id, b"GET /health"),
        service_id,
        method: "GET".to_string(),
        path: "/health".to_string(),
        summary: None,
        description: None,
        parameters: Vec::new(),
        request_body: None,
        responses: BTreeMap::from([(200, json!(null))]),
    };
    let create_user = Endpoint {
        id: Uuid::new_v5(&service_id, b"POST /users"),
        service_id,
        method: "POST".to_string(),
        path: "/users".to_string(),
        summary: None,
        description: None,
        parameters: Vec::new(),
        request_body: Some(json!({
            "type": "object",
            "properties": { "name": { "type": "string", "example": "casey" } },
        })),
        responses: BTreeMap::from([(201, json!(null))]),
    };
    app.state
        .catalog
        .store(service_id, vec![health.clone(), create_user.clone()])
        .await;

    let run_id = scheduler(&app)
        .trigger(TriggerRequest {
            trigger: RunTrigger::EndpointIds {
                service_id,
                ids: vec![health.id, create_user.id],
            },
            base_url: target.base_url.clone(),
            options: RunOptions::default(),
        })
        .await
        .unwrap();

    let job = app.state.job_queue.dequeue(1).await.unwrap().unwrap();
    let executor = RunExecutor::new(app.state.clone()).unwrap();
    let result = executor.execute(job).await.unwrap();
    ResultHandler::complete_run(&app.state, &result).await.unwrap();

    let mut case_results = app.state.results.list_case_results(run_id).await.unwrap();
    case_results.sort_by(|a, b| a.case_name.cmp(&b.case_name));

    assert_eq!(case_results.len(), 2);
    assert_eq!(case_results[0].case_name, "GET /health");
    assert_eq!(case_results[1].case_name, "POST /users");
    for case in &case_results {
        assert_eq!(case.status, CaseStatus::Passed);
        assert_eq!(case.step_results.len(), 1);
    }
}

/// Fails the first appends handed to it, standing in for a transient
/// storage outage mid-run
struct FlakyResults {
    inner: Arc<InMemoryStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl ResultStore for FlakyResults {
    async fn insert_run(&self, run: TestRun) -> AppResult<()> {
        self.inner.insert_run(run).await
    }

    async fn get_run(&self, run_id: Uuid) -> AppResult<TestRun> {
        self.inner.get_run(run_id).await
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        error_message: Option<String>,
    ) -> AppResult<()> {
        self.inner.finish_run(run_id, status, error_message).await
    }

    async fn append_case_result(&self, result: TestCaseResult) -> AppResult<()> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AppError::Persistence("result store unavailable".to_string()));
        }
        self.inner.append_case_result(result).await
    }

    async fn list_case_results(&self, run_id: Uuid) -> AppResult<Vec<TestCaseResult>> {
        self.inner.list_case_results(run_id).await
    }
}

#[tokio::test]
async fn test_requeued_job_does_not_duplicate_case_results() {
    let flaky = Arc::new(FlakyResults {
        inner: Arc::new(InMemoryStore::new()),
        failures_left: AtomicUsize::new(1),
    });
    let mut state = TestApp::new().state;
    state.results = flaky;
    let app = TestApp { state };

    let factory = Factory::new(&app.state);
    let target = MockTarget::spawn().await;

    let suite = factory.create_suite(Uuid::new_v4()).await;
    let first = factory.create_case(suite.id).await;
    factory.create_step(first.id, 0, "GET", "/health", 200).await;
    let second = factory.create_case(suite.id).await;
    factory.create_step(second.id, 0, "GET", "/health", 200).await;

    let run_id = scheduler(&app)
        .trigger(TriggerRequest {
            trigger: RunTrigger::SuiteIds(vec![suite.id]),
            base_url: target.base_url.clone(),
            options: RunOptions::default(),
        })
        .await
        .unwrap();

    let job = app.state.job_queue.dequeue(1).await.unwrap().unwrap();
    let job_id = job.id;
    let executor = RunExecutor::new(app.state.clone()).unwrap();

    // One append is refused, so the first execution reports failure with
    // a partial set of results recorded
    let err = executor.execute(job).await.unwrap_err();
    assert!(err.to_string().contains("result store unavailable"));
    assert_eq!(
        app.state.results.list_case_results(run_id).await.unwrap().len(),
        1
    );

    app.state
        .job_queue
        .fail_job(job_id, err.to_string(), true)
        .await
        .unwrap();
    let job = app.state.job_queue.dequeue(1).await.unwrap().unwrap();
    let result = executor.execute(job).await.unwrap();
    ResultHandler::complete_run(&app.state, &result).await.unwrap();

    // The retry fills in the missing case without rewriting the one
    // already recorded
    let case_results = app.state.results.list_case_results(run_id).await.unwrap();
    assert_eq!(case_results.len(), 2);
    let mut case_ids: Vec<Uuid> = case_results.iter().map(|r| r.case_id).collect();
    case_ids.sort();
    case_ids.dedup();
    assert_eq!(case_ids.len(), 2);
    assert!(case_results.iter().all(|r| r.status == CaseStatus::Passed));
}

#[tokio::test]
async fn test_cancelled_run_still_finishes_with_terminal_results() {
    let app = TestApp::new();
    let factory = Factory::new(&app.state);
    let target = MockTarget::spawn().await;

    let suite = factory.create_suite(Uuid::new_v4()).await;
    let case = factory.create_case(suite.id).await;
    factory.create_step(case.id, 0, "GET", "/slow", 200).await;
    factory.create_step(case.id, 1, "GET", "/health", 200).await;

    let scheduler = scheduler(&app);
    let run_id = scheduler
        .trigger(TriggerRequest {
            trigger: RunTrigger::SuiteIds(vec![suite.id]),
            base_url: target.base_url.clone(),
            options: RunOptions {
                step_timeout_seconds: Some(60),
                max_step_retries: Some(0),
                ..RunOptions::default()
            },
        })
        .await
        .unwrap();

    let job = app.state.job_queue.dequeue(1).await.unwrap().unwrap();
    let executor = RunExecutor::new(app.state.clone()).unwrap();
    let handle = tokio::spawn(async move { executor.execute(job).await });

    // Let the first step get stuck in flight before pulling the plug
    tokio::time::sleep(Duration::from_millis(300)).await;
    scheduler.cancel(run_id).await.unwrap();

    let result = handle.await.unwrap().unwrap();
    ResultHandler::complete_run(&app.state, &result).await.unwrap();

    // A cancelled run still completes; cancellation shows up in the
    // case results, not as a stuck run record
    let run = app.state.results.get_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let case_results = app.state.results.list_case_results(run_id).await.unwrap();
    assert_eq!(case_results.len(), 1);
    let case_result = &case_results[0];
    assert_ne!(case_result.status, CaseStatus::Passed);
    assert!(case_result
        .error_message
        .as_deref()
        .unwrap()
        .contains("cancelled"));
    assert_eq!(case_result.step_results[0].status, StepStatus::Error);
    assert_eq!(case_result.step_results[1].status, StepStatus::Skipped);
}
