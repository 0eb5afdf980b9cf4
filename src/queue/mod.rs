pub mod job;
pub mod memory_queue;

pub use job::{JobStatus, RunJob, RunJobResult, RunOptions, RunTrigger};
pub use memory_queue::InMemoryQueue;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

/// Job queue trait for abstracting queue backends
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a job onto the queue
    async fn enqueue(&self, job: RunJob) -> AppResult<Uuid>;

    /// Pop the next job from the queue (blocking with timeout)
    async fn dequeue(&self, timeout_seconds: u64) -> AppResult<Option<RunJob>>;

    /// Get job by ID
    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<RunJob>>;

    /// Mark job as completed with its result summary
    async fn complete_job(&self, job_id: Uuid, result: RunJobResult) -> AppResult<()>;

    /// Mark job as failed with error message
    async fn fail_job(&self, job_id: Uuid, error: String, retryable: bool) -> AppResult<()>;

    /// Get queue length
    async fn queue_length(&self) -> AppResult<u64>;

    /// Cancel a pending or running job
    async fn cancel_job(&self, job_id: Uuid) -> AppResult<()>;
}
