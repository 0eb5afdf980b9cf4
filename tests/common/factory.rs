use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use chainrun::models::{CreateCase, CreateStep, CreateSuite, TestCase, TestStep, TestSuite};
use chainrun::repositories::SuiteStore;
use chainrun::state::AppState;

/// Factory for creating test data
pub struct Factory<'a> {
    state: &'a AppState,
}

#[allow(dead_code)]
impl<'a> Factory<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create_suite(&self, service_id: Uuid) -> TestSuite {
        self.state
            .suites
            .create_suite(
                service_id,
                CreateSuite {
                    name: format!("suite-{}", Uuid::new_v4()),
                    description: None,
                    target_method: "POST".to_string(),
                    target_path: "/users".to_string(),
                },
            )
            .await
            .unwrap()
    }

    pub async fn create_case(&self, suite_id: Uuid) -> TestCase {
        self.state
            .suites
            .create_case(
                suite_id,
                CreateCase {
                    name: format!("case-{}", Uuid::new_v4()),
                    description: None,
                    error_type: None,
                },
            )
            .await
            .unwrap()
    }

    /// A bare step with no headers, body or extraction rules
    pub async fn create_step(
        &self,
        case_id: Uuid,
        sequence: i32,
        method: &str,
        path: &str,
        expected_status: u16,
    ) -> TestStep {
        self.state
            .suites
            .create_step(
                case_id,
                CreateStep {
                    sequence,
                    method: method.to_string(),
                    path: path.to_string(),
                    headers: HashMap::new(),
                    query_params: HashMap::new(),
                    body: None,
                    extract_rules: HashMap::new(),
                    expected_status,
                },
            )
            .await
            .unwrap()
    }

    /// A two-step chain: create a user, then fetch it through the id
    /// extracted from the creation response
    pub async fn create_user_chain(&self, suite_id: Uuid) -> TestCase {
        let case = self.create_case(suite_id).await;

        self.state
            .suites
            .create_step(
                case.id,
                CreateStep {
                    sequence: 0,
                    method: "POST".to_string(),
                    path: "/users".to_string(),
                    headers: HashMap::new(),
                    query_params: HashMap::new(),
                    body: Some(json!({ "name": "casey" })),
                    extract_rules: HashMap::from([("uid".to_string(), "$.id".to_string())]),
                    expected_status: 201,
                },
            )
            .await
            .unwrap();
        self.state
            .suites
            .create_step(
                case.id,
                CreateStep {
                    sequence: 1,
                    method: "GET".to_string(),
                    path: "/users/{uid}".to_string(),
                    headers: HashMap::new(),
                    query_params: HashMap::new(),
                    body: None,
                    extract_rules: HashMap::new(),
                    expected_status: 200,
                },
            )
            .await
            .unwrap();

        case
    }
}
