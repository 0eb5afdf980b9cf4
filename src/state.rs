use std::sync::Arc;

use crate::config::Config;
use crate::queue::{InMemoryQueue, JobQueue};
use crate::repositories::{EndpointCatalog, InMemoryStore, ResultStore, SuiteStore};
use crate::services::scheduler::CancelRegistry;

/// Shared application state: storage, queue and the cancellation
/// registry. Everything is behind trait objects so a durable backend can
/// replace the in-memory implementations without touching the engine.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub suites: Arc<dyn SuiteStore>,
    pub results: Arc<dyn ResultStore>,
    pub catalog: Arc<EndpointCatalog>,
    pub job_queue: Arc<dyn JobQueue>,
    pub cancellations: CancelRegistry,
}

impl AppState {
    /// In-memory state, the default for the worker binary and tests
    pub fn new(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            config,
            suites: store.clone(),
            results: store,
            catalog: Arc::new(EndpointCatalog::new()),
            job_queue: Arc::new(InMemoryQueue::new()),
            cancellations: CancelRegistry::new(),
        }
    }

    /// State with custom storage/queue backends
    pub fn with_backends(
        config: Config,
        suites: Arc<dyn SuiteStore>,
        results: Arc<dyn ResultStore>,
        catalog: Arc<EndpointCatalog>,
        job_queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            config,
            suites,
            results,
            catalog,
            job_queue,
            cancellations: CancelRegistry::new(),
        }
    }
}
