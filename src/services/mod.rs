pub mod aggregator;
pub mod chain;
pub mod executor;
pub mod graph;
pub mod policy;
pub mod runner;
pub mod scheduler;
pub mod schema;
pub mod selector;
pub mod vars;

pub use aggregator::ResultAggregator;
pub use chain::{ChainPopulator, TemplateChainPopulator};
pub use executor::{ExecutionContext, TestExecutionEngine};
pub use graph::{DependencyGraph, DependencyGraphBuilder};
pub use policy::{BackoffStrategy, RetryPolicy, TimeoutPolicy};
pub use runner::{ResultHandler, RunExecutor};
pub use scheduler::{CancelRegistry, RunScheduler, TriggerRequest};
pub use schema::SchemaResolver;
pub use selector::{ChainCandidate, ChainCandidateSelector};
