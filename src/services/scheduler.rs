use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{RunStatus, TestRun};
use crate::queue::{JobQueue, JobStatus, RunJob, RunOptions, RunTrigger};
use crate::repositories::ResultStore;

/// Cancellation channels for in-flight runs, keyed by run id. Signaling
/// a run flips its watch channel; every case execution of that run holds
/// a receiver.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    inner: Arc<Mutex<HashMap<Uuid, watch::Sender<bool>>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reuse) the channel for a run
    pub fn register(&self, run_id: Uuid) -> watch::Receiver<bool> {
        let mut inner = self.inner.lock().expect("cancel registry poisoned");
        inner
            .entry(run_id)
            .or_insert_with(|| watch::channel(false).0)
            .subscribe()
    }

    /// Signal cancellation. Returns false when the run is unknown or
    /// already cleaned up.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        let inner = self.inner.lock().expect("cancel registry poisoned");
        match inner.get(&run_id) {
            Some(tx) => {
                // send_replace works even when no receiver is currently
                // subscribed; late subscribers still observe the flag
                tx.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Drop the channel once the run reached a terminal status
    pub fn remove(&self, run_id: Uuid) {
        let mut inner = self.inner.lock().expect("cancel registry poisoned");
        inner.remove(&run_id);
    }
}

/// Triggering input from the (out-of-scope) API layer: what to run and
/// where to run it.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub trigger: RunTrigger,
    pub base_url: String,
    pub options: RunOptions,
}

/// Accepts trigger requests, persists the run record and hands the work
/// to the queue. Returns the run id immediately; execution proceeds
/// asynchronously in the worker.
pub struct RunScheduler {
    results: Arc<dyn ResultStore>,
    queue: Arc<dyn JobQueue>,
    cancellations: CancelRegistry,
}

impl RunScheduler {
    pub fn new(
        results: Arc<dyn ResultStore>,
        queue: Arc<dyn JobQueue>,
        cancellations: CancelRegistry,
    ) -> Self {
        Self {
            results,
            queue,
            cancellations,
        }
    }

    pub async fn trigger(&self, request: TriggerRequest) -> AppResult<Uuid> {
        match &request.trigger {
            RunTrigger::SuiteIds(ids) if ids.is_empty() => {
                return Err(AppError::Validation("No suites to run".to_string()));
            }
            RunTrigger::EndpointIds { ids, .. } if ids.is_empty() => {
                return Err(AppError::Validation("No endpoints to run".to_string()));
            }
            _ => {}
        }

        let run = TestRun::new(request.base_url.clone());
        let run_id = run.id;
        self.results.insert_run(run).await?;
        self.cancellations.register(run_id);

        let job = RunJob::new(run_id, request.trigger, request.base_url, request.options);
        self.queue.enqueue(job).await?;

        tracing::info!(run_id = %run_id, "Run scheduled");
        Ok(run_id)
    }

    /// Propagate cancellation to all in-flight case executions of a run.
    /// A job still waiting in the queue is withdrawn and the run record
    /// finalized here, since no worker will ever pick it up.
    pub async fn cancel(&self, run_id: Uuid) -> AppResult<()> {
        if !self.cancellations.cancel(run_id) {
            return Err(AppError::NotFound("Run".to_string()));
        }

        let job_id = RunJob::id_for(run_id);
        if let Some(job) = self.queue.get_job(job_id).await? {
            if job.status == JobStatus::Pending {
                self.queue.cancel_job(job_id).await?;
                self.results
                    .finish_run(
                        run_id,
                        RunStatus::Completed,
                        Some("Run cancelled before execution started".to_string()),
                    )
                    .await?;
                self.cancellations.remove(run_id);
            }
        }

        tracing::info!(run_id = %run_id, "Run cancellation signaled");
        Ok(())
    }
}
