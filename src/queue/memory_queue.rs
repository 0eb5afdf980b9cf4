use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::queue::{JobQueue, JobStatus, RunJob, RunJobResult};

/// In-memory queue backing the worker; also used directly by tests
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Mutex<InMemoryQueueInner>>,
    notify: Arc<Notify>,
}

struct InMemoryQueueInner {
    queue: VecDeque<Uuid>,
    jobs: HashMap<Uuid, RunJob>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryQueueInner {
                queue: VecDeque::new(),
                jobs: HashMap::new(),
            })),
            notify: Arc::new(Notify::new()),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, job: RunJob) -> AppResult<Uuid> {
        let job_id = job.id;
        let mut inner = self.inner.lock().await;
        inner.jobs.insert(job_id, job);
        inner.queue.push_back(job_id);
        drop(inner);
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn dequeue(&self, timeout_seconds: u64) -> AppResult<Option<RunJob>> {
        let timeout = std::time::Duration::from_secs(timeout_seconds);

        // Try to get a job immediately
        {
            let mut inner = self.inner.lock().await;
            if let Some(job_id) = inner.queue.pop_front() {
                if let Some(job) = inner.jobs.get_mut(&job_id) {
                    job.status = JobStatus::Running;
                    job.started_at = Some(time::OffsetDateTime::now_utc());
                    return Ok(Some(job.clone()));
                }
            }
        }

        // Wait for notification with timeout
        tokio::select! {
            _ = tokio::time::sleep(timeout) => Ok(None),
            _ = self.notify.notified() => {
                let mut inner = self.inner.lock().await;
                if let Some(job_id) = inner.queue.pop_front() {
                    if let Some(job) = inner.jobs.get_mut(&job_id) {
                        job.status = JobStatus::Running;
                        job.started_at = Some(time::OffsetDateTime::now_utc());
                        return Ok(Some(job.clone()));
                    }
                }
                Ok(None)
            }
        }
    }

    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<RunJob>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&job_id).cloned())
    }

    async fn complete_job(&self, job_id: Uuid, result: RunJobResult) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound("Job".to_string()))?;
        job.status = JobStatus::Completed;
        job.result = Some(result);
        job.completed_at = Some(time::OffsetDateTime::now_utc());
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: String, retryable: bool) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound("Job".to_string()))?;

        job.error_message = Some(error);

        if retryable && job.retry_count < job.max_retries {
            job.retry_count += 1;
            job.status = JobStatus::Failed;
            // Put it back for another attempt
            let job_id = job.id;
            inner.queue.push_back(job_id);
            drop(inner);
            self.notify.notify_one();
        } else {
            job.status = JobStatus::Dead;
            job.completed_at = Some(time::OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn queue_length(&self) -> AppResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.queue.len() as u64)
    }

    async fn cancel_job(&self, job_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound("Job".to_string()))?;

        if job.status.is_terminal() {
            return Err(AppError::Validation(
                "Cannot cancel a completed job".to_string(),
            ));
        }

        job.status = JobStatus::Cancelled;
        job.completed_at = Some(time::OffsetDateTime::now_utc());
        inner.queue.retain(|id| *id != job_id);
        Ok(())
    }
}
