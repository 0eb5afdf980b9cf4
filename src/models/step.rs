use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One HTTP call within a test case chain.
///
/// The path may contain `{param}` placeholders and headers/body/query
/// values may reference previously extracted variables as `${var}`.
/// `extract_rules` maps variable names to JSONPath expressions evaluated
/// against this step's response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestStep {
    pub id: Uuid,
    pub case_id: Uuid,
    /// Execution order within the case: starts at 0, strictly increasing,
    /// gaps allowed, ties rejected at insert time
    pub sequence: i32,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub extract_rules: HashMap<String, String>,
    /// Three-digit HTTP status required for pass/fail judgement
    pub expected_status: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStep {
    pub sequence: i32,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub extract_rules: HashMap<String, String>,
    pub expected_status: u16,
}

impl TestStep {
    pub fn new(case_id: Uuid, create: CreateStep) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            sequence: create.sequence,
            method: create.method,
            path: create.path,
            headers: create.headers,
            query_params: create.query_params,
            body: create.body,
            extract_rules: create.extract_rules,
            expected_status: create.expected_status,
        }
    }
}
