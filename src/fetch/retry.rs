use std::{future::Future, time::Duration};
use tracing::{debug, error, warn};

use crate::error::PipelineResult;

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(15),
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// `policy.max_retries` retries are used up. The last error is returned.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PipelineResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if attempt > 1 {
            debug!(operation = operation_name, attempt, "retrying");
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt > policy.max_retries => {
                error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "retries exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
