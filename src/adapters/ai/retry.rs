//! Shared retry policy for provider adapters.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::ports::ProviderError;

/// Runs `attempt` until it succeeds, fails permanently, or exhausts
/// `max_retries` retries of transient errors.
///
/// Backoff is exponential: 1s, 2s, 4s, ... between attempts.
pub(crate) async fn with_backoff<F, Fut, T>(
    max_retries: u32,
    mut attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retry_count = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry_count < max_retries => {
                let delay = Duration::from_secs(1u64 << retry_count);
                warn!(error = %err, retry = retry_count + 1, delay_secs = delay.as_secs(),
                      "transient provider error, backing off");
                sleep(delay).await;
                retry_count += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
