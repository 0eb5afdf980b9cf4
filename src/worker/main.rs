use tokio::signal;
use tokio::sync::watch;

use chainrun::config::Config;
use chainrun::error::AppError;
use chainrun::services::runner::{ResultHandler, RunExecutor};
use chainrun::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting chainrun worker...");

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");

    // Initialize application state
    let state = AppState::new(config);

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping worker...");
        let _ = shutdown_tx.send(true);
    });

    // Create run executor
    let executor = RunExecutor::new(state.clone()).expect("Failed to create run executor");

    // Worker loop
    tracing::info!("Worker started, waiting for run jobs...");
    loop {
        // Check for shutdown
        if *shutdown_rx.borrow() {
            tracing::info!("Shutdown requested, exiting worker loop");
            break;
        }

        // Try to dequeue a job (with 5 second timeout)
        match state.job_queue.dequeue(5).await {
            Ok(Some(job)) => {
                let job_id = job.id;
                let run_id = job.run_id;
                tracing::info!(job_id = %job_id, run_id = %run_id, "Processing run job");

                match executor.execute(job).await {
                    Ok(result) => {
                        tracing::info!(
                            job_id = %job_id,
                            passed = result.cases_passed,
                            failed = result.cases_failed,
                            "Run job completed"
                        );
                        if let Err(e) = ResultHandler::complete_run(&state, &result).await {
                            tracing::error!(run_id = %run_id, error = %e, "Failed to finalize run");
                        }
                        if let Err(e) = state.job_queue.complete_job(job_id, result).await {
                            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as complete");
                        }
                    }
                    Err(e) => {
                        let is_retryable = is_retryable_error(&e);
                        tracing::error!(
                            job_id = %job_id,
                            error = %e,
                            retryable = is_retryable,
                            "Run job failed"
                        );
                        if let Err(e) = state
                            .job_queue
                            .fail_job(job_id, e.to_string(), is_retryable)
                            .await
                        {
                            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
                        }
                        // The run record goes failed once the job is out
                        // of retries (or was never retryable)
                        let exhausted = match state.job_queue.get_job(job_id).await {
                            Ok(Some(job)) => job.status.is_terminal(),
                            _ => true,
                        };
                        if exhausted {
                            if let Err(e) =
                                ResultHandler::fail_run(&state, run_id, e.to_string()).await
                            {
                                tracing::error!(run_id = %run_id, error = %e, "Failed to mark run as failed");
                            }
                        }
                    }
                }
            }
            Ok(None) => {
                // No job available, continue loop (dequeue already waited)
            }
            Err(e) => {
                tracing::error!(error = %e, "Error dequeuing job");
                // Brief sleep on error to prevent tight loop
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }

    tracing::info!("Worker shutdown complete");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Only infrastructure-level failures are worth re-running the job for;
/// everything else is deterministic and would fail again.
fn is_retryable_error(error: &AppError) -> bool {
    matches!(error, AppError::Persistence(_) | AppError::Queue(_))
}
