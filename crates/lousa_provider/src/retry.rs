use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use lousa_domain::{should_retry, RetryConfig};

/// Retries `operation` with exponential backoff according to `config`.
///
/// Only errors downcasting to the domain `Error::Retryable` variant trigger
/// another attempt; business-rule errors propagate on the first failure.
pub async fn retry_with_config<F, Fut, T>(config: &RetryConfig, operation: F) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let strategy = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(config.min_delay_ms))
        .with_factor(config.backoff_factor as f32)
        .with_max_times(config.max_retries());

    operation.retry(&strategy).when(should_retry).await
}
