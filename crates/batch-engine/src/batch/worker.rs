//! Per-item retry loop

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::metrics::BatchMetrics;
use super::outcome::{ItemError, Outcome, WorkItem};
use crate::error::RemoteError;
use crate::reliability::{Disposition, ErrorPolicy, RetryPolicy};

/// Everything a worker task needs besides the item and the worker itself
pub(crate) struct AttemptContext<'a> {
    pub policy: &'a ErrorPolicy,
    pub retry: &'a RetryPolicy,
    pub cancel: &'a CancellationToken,
    pub metrics: &'a BatchMetrics,
    /// Invocations so far; readable by the spawner even if the task dies
    pub attempts: &'a AtomicU32,
}

/// Invoke `worker` for `item` until it reaches a terminal outcome
///
/// Returns the outcome and the number of worker invocations. Cancellation is
/// checked before every retry sleep, never in the middle of an invocation.
pub(crate) async fn run_item<P, R, F, Fut>(
    item: &WorkItem<P>,
    worker: &F,
    ctx: AttemptContext<'_>,
) -> (Outcome<R>, u32)
where
    P: Clone,
    F: Fn(WorkItem<P>) -> Fut,
    Fut: Future<Output = Result<R, RemoteError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        ctx.attempts.store(attempt, Ordering::Relaxed);

        let result = {
            let _in_flight = ctx.metrics.attempt_started();
            worker(item.clone()).await
        };

        let error = match result {
            Ok(output) => {
                debug!(item = %item.id, target = %item.target, attempt, "Item succeeded");
                return (Outcome::Succeeded(output), attempt);
            }
            Err(error) => error,
        };

        match ctx.policy.disposition(&error) {
            Disposition::Skip => {
                info!(item = %item.id, target = %item.target, reason = %error, "Skipping item");
                return (Outcome::Skipped(error.into()), attempt);
            }
            Disposition::Fail => {
                warn!(item = %item.id, target = %item.target, attempt, error = %error, "Item failed");
                return (Outcome::Failed(ItemError::Remote(error)), attempt);
            }
            Disposition::Retry => {}
        }

        if !ctx.retry.has_attempts_remaining(attempt) {
            warn!(item = %item.id, target = %item.target, attempt, error = %error, "Retries exhausted");
            return (
                Outcome::Failed(ItemError::RetriesExhausted {
                    attempts: attempt,
                    last: error,
                }),
                attempt,
            );
        }

        if ctx.cancel.is_cancelled() {
            return (Outcome::Failed(ItemError::Cancelled), attempt);
        }

        let delay = ctx.retry.delay_for_attempt(attempt + 1);
        ctx.metrics.retry_scheduled();
        warn!(
            item = %item.id,
            target = %item.target,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.cancel.cancelled() => {
                debug!(item = %item.id, "Cancelled while waiting to retry");
                return (Outcome::Failed(ItemError::Cancelled), attempt);
            }
        }
    }
}
