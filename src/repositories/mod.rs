pub mod catalog;
pub mod memory;

pub use catalog::EndpointCatalog;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    CreateCase, CreateStep, CreateSuite, RunStatus, TestCase, TestCaseResult, TestRun, TestStep,
    TestSuite,
};

/// Storage for suite/case/step definitions. Deleting a suite cascades to
/// its cases and steps; nothing here touches historical run results.
#[async_trait]
pub trait SuiteStore: Send + Sync {
    async fn create_suite(&self, service_id: Uuid, create: CreateSuite) -> AppResult<TestSuite>;

    async fn get_suite(&self, suite_id: Uuid) -> AppResult<TestSuite>;

    async fn list_suites(&self, service_id: Uuid) -> AppResult<Vec<TestSuite>>;

    async fn delete_suite(&self, suite_id: Uuid) -> AppResult<()>;

    async fn create_case(&self, suite_id: Uuid, create: CreateCase) -> AppResult<TestCase>;

    async fn get_case(&self, case_id: Uuid) -> AppResult<TestCase>;

    /// Cases of a suite in creation order
    async fn list_cases(&self, suite_id: Uuid) -> AppResult<Vec<TestCase>>;

    async fn delete_case(&self, case_id: Uuid) -> AppResult<()>;

    /// Rejects a step whose sequence ties an existing step of the case
    async fn create_step(&self, case_id: Uuid, create: CreateStep) -> AppResult<TestStep>;

    /// Steps of a case in ascending sequence order
    async fn list_steps(&self, case_id: Uuid) -> AppResult<Vec<TestStep>>;

    async fn delete_step(&self, step_id: Uuid) -> AppResult<()>;
}

/// Append-only storage for run outcomes. One writer per case result;
/// the run record is keyed on run id and finalized exactly once.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn insert_run(&self, run: TestRun) -> AppResult<()>;

    async fn get_run(&self, run_id: Uuid) -> AppResult<TestRun>;

    /// Set a terminal status and finish timestamp on the run record
    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        error_message: Option<String>,
    ) -> AppResult<()>;

    /// Append one completed case result (with its step results)
    async fn append_case_result(&self, result: TestCaseResult) -> AppResult<()>;

    /// Case results of a run in append order
    async fn list_case_results(&self, run_id: Uuid) -> AppResult<Vec<TestCaseResult>>;
}
