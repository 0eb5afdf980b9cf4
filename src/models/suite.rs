use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// An ordered group of test cases exercising related endpoints.
/// Deleting a suite cascades to its cases and steps; historical run
/// results are snapshots and are not touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// The entry endpoint this suite exercises
    pub target_method: String,
    pub target_path: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSuite {
    pub name: String,
    pub description: Option<String>,
    pub target_method: String,
    pub target_path: String,
}
