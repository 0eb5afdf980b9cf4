use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    CreateCase, CreateStep, CreateSuite, RunStatus, TestCase, TestCaseResult, TestRun, TestStep,
    TestSuite,
};
use crate::repositories::{ResultStore, SuiteStore};

/// In-memory implementation of both stores, used by the worker and tests.
/// Any durable backend can stand in as long as the trait contracts hold.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    suites: HashMap<Uuid, TestSuite>,
    cases: HashMap<Uuid, TestCase>,
    steps: HashMap<Uuid, TestStep>,
    // Insertion counters keep list order stable
    case_order: Vec<Uuid>,
    runs: HashMap<Uuid, TestRun>,
    case_results: Vec<TestCaseResult>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SuiteStore for InMemoryStore {
    async fn create_suite(&self, service_id: Uuid, create: CreateSuite) -> AppResult<TestSuite> {
        let now = OffsetDateTime::now_utc();
        let suite = TestSuite {
            id: Uuid::new_v4(),
            service_id,
            name: create.name,
            description: create.description,
            target_method: create.target_method,
            target_path: create.target_path,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.write().await;
        inner.suites.insert(suite.id, suite.clone());
        Ok(suite)
    }

    async fn get_suite(&self, suite_id: Uuid) -> AppResult<TestSuite> {
        let inner = self.inner.read().await;
        inner
            .suites
            .get(&suite_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Suite".to_string()))
    }

    async fn list_suites(&self, service_id: Uuid) -> AppResult<Vec<TestSuite>> {
        let inner = self.inner.read().await;
        let mut suites: Vec<TestSuite> = inner
            .suites
            .values()
            .filter(|s| s.service_id == service_id)
            .cloned()
            .collect();
        suites.sort_by_key(|s| s.created_at);
        Ok(suites)
    }

    async fn delete_suite(&self, suite_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.suites.remove(&suite_id).is_none() {
            return Err(AppError::NotFound("Suite".to_string()));
        }
        // Cascade to cases and steps
        let case_ids: Vec<Uuid> = inner
            .cases
            .values()
            .filter(|c| c.suite_id == suite_id)
            .map(|c| c.id)
            .collect();
        for case_id in &case_ids {
            inner.cases.remove(case_id);
            inner.case_order.retain(|id| id != case_id);
        }
        inner
            .steps
            .retain(|_, step| !case_ids.contains(&step.case_id));
        Ok(())
    }

    async fn create_case(&self, suite_id: Uuid, create: CreateCase) -> AppResult<TestCase> {
        let mut inner = self.inner.write().await;
        if !inner.suites.contains_key(&suite_id) {
            return Err(AppError::NotFound("Suite".to_string()));
        }
        let case = TestCase::new(suite_id, create);
        inner.cases.insert(case.id, case.clone());
        inner.case_order.push(case.id);
        Ok(case)
    }

    async fn get_case(&self, case_id: Uuid) -> AppResult<TestCase> {
        let inner = self.inner.read().await;
        inner
            .cases
            .get(&case_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Case".to_string()))
    }

    async fn list_cases(&self, suite_id: Uuid) -> AppResult<Vec<TestCase>> {
        let inner = self.inner.read().await;
        Ok(inner
            .case_order
            .iter()
            .filter_map(|id| inner.cases.get(id))
            .filter(|c| c.suite_id == suite_id)
            .cloned()
            .collect())
    }

    async fn delete_case(&self, case_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.cases.remove(&case_id).is_none() {
            return Err(AppError::NotFound("Case".to_string()));
        }
        inner.case_order.retain(|id| *id != case_id);
        inner.steps.retain(|_, step| step.case_id != case_id);
        Ok(())
    }

    async fn create_step(&self, case_id: Uuid, create: CreateStep) -> AppResult<TestStep> {
        let mut inner = self.inner.write().await;
        if !inner.cases.contains_key(&case_id) {
            return Err(AppError::NotFound("Case".to_string()));
        }
        // Sequence ties within a case are illegal
        if inner
            .steps
            .values()
            .any(|s| s.case_id == case_id && s.sequence == create.sequence)
        {
            return Err(AppError::Validation(format!(
                "Duplicate step sequence {} in case {}",
                create.sequence, case_id
            )));
        }
        let step = TestStep::new(case_id, create);
        inner.steps.insert(step.id, step.clone());
        Ok(step)
    }

    async fn list_steps(&self, case_id: Uuid) -> AppResult<Vec<TestStep>> {
        let inner = self.inner.read().await;
        let mut steps: Vec<TestStep> = inner
            .steps
            .values()
            .filter(|s| s.case_id == case_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.sequence);
        Ok(steps)
    }

    async fn delete_step(&self, step_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .steps
            .remove(&step_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Step".to_string()))
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn insert_run(&self, run: TestRun) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.runs.insert(run.id, run);
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> AppResult<TestRun> {
        let inner = self.inner.read().await;
        inner
            .runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Run".to_string()))
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        error_message: Option<String>,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::NotFound("Run".to_string()))?;
        run.status = status;
        run.finished_at = Some(OffsetDateTime::now_utc());
        run.error_message = error_message;
        Ok(())
    }

    async fn append_case_result(&self, result: TestCaseResult) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.runs.contains_key(&result.run_id) {
            return Err(AppError::NotFound("Run".to_string()));
        }
        inner.case_results.push(result);
        Ok(())
    }

    async fn list_case_results(&self, run_id: Uuid) -> AppResult<Vec<TestCaseResult>> {
        let inner = self.inner.read().await;
        Ok(inner
            .case_results
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn create_suite_req() -> CreateSuite {
        CreateSuite {
            name: "users lifecycle".to_string(),
            description: None,
            target_method: "POST".to_string(),
            target_path: "/users".to_string(),
        }
    }

    fn create_step_req(sequence: i32) -> CreateStep {
        CreateStep {
            sequence,
            method: "GET".to_string(),
            path: "/users".to_string(),
            headers: StdHashMap::new(),
            query_params: StdHashMap::new(),
            body: None,
            extract_rules: StdHashMap::new(),
            expected_status: 200,
        }
    }

    #[tokio::test]
    async fn test_suite_crud_cascades() {
        let store = InMemoryStore::new();
        let service_id = Uuid::new_v4();

        let suite = store
            .create_suite(service_id, create_suite_req())
            .await
            .unwrap();
        let case = store
            .create_case(
                suite.id,
                CreateCase {
                    name: "happy path".to_string(),
                    description: None,
                    error_type: None,
                },
            )
            .await
            .unwrap();
        store.create_step(case.id, create_step_req(0)).await.unwrap();

        store.delete_suite(suite.id).await.unwrap();
        assert!(store.get_case(case.id).await.is_err());
        assert!(store.list_steps(case.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_sequence_rejected() {
        let store = InMemoryStore::new();
        let suite = store
            .create_suite(Uuid::new_v4(), create_suite_req())
            .await
            .unwrap();
        let case = store
            .create_case(
                suite.id,
                CreateCase {
                    name: "dup".to_string(),
                    description: None,
                    error_type: None,
                },
            )
            .await
            .unwrap();

        store.create_step(case.id, create_step_req(1)).await.unwrap();
        let err = store.create_step(case.id, create_step_req(1)).await;
        assert!(matches!(err, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_steps_listed_in_sequence_order() {
        let store = InMemoryStore::new();
        let suite = store
            .create_suite(Uuid::new_v4(), create_suite_req())
            .await
            .unwrap();
        let case = store
            .create_case(
                suite.id,
                CreateCase {
                    name: "ordering".to_string(),
                    description: None,
                    error_type: None,
                },
            )
            .await
            .unwrap();

        for seq in [5, 0, 3] {
            store.create_step(case.id, create_step_req(seq)).await.unwrap();
        }
        let steps = store.list_steps(case.id).await.unwrap();
        let sequences: Vec<i32> = steps.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 3, 5]);
    }

    #[tokio::test]
    async fn test_results_survive_definition_deletion() {
        let store = InMemoryStore::new();
        let suite = store
            .create_suite(Uuid::new_v4(), create_suite_req())
            .await
            .unwrap();
        let case = store
            .create_case(
                suite.id,
                CreateCase {
                    name: "snapshot".to_string(),
                    description: None,
                    error_type: None,
                },
            )
            .await
            .unwrap();

        let run = TestRun::new("http://localhost:1".to_string());
        let run_id = run.id;
        store.insert_run(run).await.unwrap();
        store
            .append_case_result(TestCaseResult {
                id: Uuid::new_v4(),
                run_id,
                case_id: case.id,
                case_name: case.name.clone(),
                status: crate::models::CaseStatus::Passed,
                error_message: None,
                step_results: Vec::new(),
                started_at: OffsetDateTime::now_utc(),
                duration_ms: 12,
            })
            .await
            .unwrap();

        store.delete_suite(suite.id).await.unwrap();

        let results = store.list_case_results(run_id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].case_id, case.id);
    }
}
