use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A test case: one ordered chain of steps within a suite.
/// `error_type` tags negative-path cases (e.g. "missing_field",
/// "invalid_input", "auth_error").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: Uuid,
    pub suite_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub error_type: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCase {
    pub name: String,
    pub description: Option<String>,
    pub error_type: Option<String>,
}

impl TestCase {
    pub fn new(suite_id: Uuid, create: CreateCase) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            suite_id,
            name: create.name,
            description: create.description,
            error_type: create.error_type,
            created_at: now,
            updated_at: now,
        }
    }
}
