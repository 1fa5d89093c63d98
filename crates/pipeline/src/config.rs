//! Dispatcher configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Worker pool settings.
///
/// Reads from environment variables:
/// - `PIPELINE_WORKERS`: number of worker tasks (default: `8`)
/// - `PIPELINE_QUEUE_CAPACITY`: ingress queue bound (default: `256`)
/// - `PIPELINE_ENQUEUE_TIMEOUT_MS`: how long `enqueue` waits for room (default: `2000`)
/// - `PIPELINE_SHUTDOWN_GRACE_MS`: drain budget on shutdown (default: `10000`)
/// - `PIPELINE_MAX_ATTEMPTS`: attempts per envelope on transient errors (default: `3`)
/// - `PIPELINE_RETRY_BASE_DELAY_MS`: first backoff delay (default: `100`)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub shutdown_grace: Duration,
    pub retry: RetryPolicy,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_or("PIPELINE_WORKERS", defaults.workers),
            queue_capacity: env_or("PIPELINE_QUEUE_CAPACITY", defaults.queue_capacity),
            enqueue_timeout: Duration::from_millis(env_or(
                "PIPELINE_ENQUEUE_TIMEOUT_MS",
                defaults.enqueue_timeout.as_millis() as u64,
            )),
            shutdown_grace: Duration::from_millis(env_or(
                "PIPELINE_SHUTDOWN_GRACE_MS",
                defaults.shutdown_grace.as_millis() as u64,
            )),
            retry: RetryPolicy::new(
                env_or("PIPELINE_MAX_ATTEMPTS", defaults.retry.max_attempts),
                Duration::from_millis(env_or(
                    "PIPELINE_RETRY_BASE_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )),
            ),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 256,
            enqueue_timeout: Duration::from_millis(2000),
            shutdown_grace: Duration::from_millis(10_000),
            retry: RetryPolicy::default(),
        }
    }
}
