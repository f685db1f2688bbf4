use std::{future::Future, time::Duration};

use common::error::AppError;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::warn;

use super::config::RenderTuning;

/// Runs `action`, retrying transient failures with jittered exponential backoff.
///
/// Delays start near `retry_base_ms` and double on each retry. Non-transient errors are
/// returned immediately.
pub async fn with_retry<T, F, Fut>(
    tuning: &RenderTuning,
    operation: &'static str,
    action: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let factor = (tuning.retry_base_ms / 2).max(1);
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(factor)
        .max_delay(Duration::from_millis(tuning.retry_max_delay_ms))
        .map(jitter)
        .take(tuning.retry_attempts);

    RetryIf::spawn(strategy, action, |err: &AppError| {
        let transient = err.is_transient();
        if transient {
            warn!(operation, error = %err, "Transient adapter failure; retrying");
        }
        transient
    })
    .await
}
