use std::env;
use std::time::Duration;

use crate::services::policy::BackoffStrategy;

#[derive(Debug, Clone)]
pub struct Config {
    // Execution defaults (overridable per run)
    pub step_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub backoff_strategy: BackoffStrategy,

    // Concurrency
    pub worker_pool_size: usize,

    // Chain composition
    pub max_chain_depth: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if exists

        let step_timeout_secs: u64 = env::var("STEP_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("STEP_TIMEOUT_SECONDS"))?;

        let retry_base_delay_ms: u64 = env::var("RETRY_BASE_DELAY_MS")
            .unwrap_or_else(|_| "250".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("RETRY_BASE_DELAY_MS"))?;

        let backoff_strategy = match env::var("BACKOFF_STRATEGY")
            .unwrap_or_else(|_| "exponential".to_string())
            .as_str()
        {
            "fixed" => BackoffStrategy::Fixed,
            "linear" => BackoffStrategy::Linear,
            "exponential" => BackoffStrategy::ExponentialJitter,
            _ => return Err(ConfigError::Invalid("BACKOFF_STRATEGY")),
        };

        Ok(Self {
            step_timeout: Duration::from_secs(step_timeout_secs),
            max_retries: env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("MAX_RETRIES"))?,
            retry_base_delay: Duration::from_millis(retry_base_delay_ms),
            backoff_strategy,
            worker_pool_size: env::var("WORKER_POOL_SIZE")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("WORKER_POOL_SIZE"))?,
            max_chain_depth: env::var("MAX_CHAIN_DEPTH")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("MAX_CHAIN_DEPTH"))?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(250),
            backoff_strategy: BackoffStrategy::ExponentialJitter,
            worker_pool_size: 4,
            max_chain_depth: 8,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable: {0}")]
    Invalid(&'static str),
}
