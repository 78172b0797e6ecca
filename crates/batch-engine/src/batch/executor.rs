//! Wave-based batch executor
//!
//! Items are dispatched in consecutive waves of at most `concurrency` items.
//! Every item of a wave runs as its own task; the next wave starts only after
//! all of them reach a terminal outcome.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::metrics::BatchMetrics;
use super::outcome::{BatchReport, ItemError, ItemReport, Outcome, WorkItem};
use super::worker::{run_item, AttemptContext};
use crate::config::ConfigError;
use crate::error::RemoteError;
use crate::reliability::{ErrorPolicy, RetryPolicy};

/// Batch executor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// Items in flight per wave
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay and ceiling for transient failures
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_concurrency() -> usize {
    10
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retry: RetryPolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Create a configuration with the given wave width
    pub fn new(concurrency: usize) -> Self {
        Self::default().with_concurrency(concurrency)
    }

    /// Set the wave width (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.retry.max_attempts == Some(0) {
            return Err(ConfigError::ZeroAttempts);
        }
        let coefficient = self.retry.backoff_coefficient;
        if !coefficient.is_finite() || coefficient < 1.0 {
            return Err(ConfigError::InvalidBackoffCoefficient(coefficient));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::InvalidJitter(self.retry.jitter));
        }
        Ok(())
    }
}

/// Applies one operation to many items with bounded parallelism
///
/// # Example
///
/// ```ignore
/// use batch_engine::{BatchConfig, BatchExecutor, ErrorPolicy, WorkItem};
///
/// let executor = BatchExecutor::new(BatchConfig::new(25));
///
/// let items = emails
///     .into_iter()
///     .map(|email| WorkItem::new(email, "staff@example.com"))
///     .collect();
///
/// let report = executor
///     .execute(items, ErrorPolicy::delete(NotFoundPolicy::Skip), move |item| {
///         let service = service.clone();
///         async move { service.delete_member(&item.target, &item.id).await }
///     })
///     .await;
///
/// println!("{}", report.summary());
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchExecutor {
    config: BatchConfig,
    cancel: CancellationToken,
    metrics: Arc<BatchMetrics>,
}

impl BatchExecutor {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            metrics: Arc::new(BatchMetrics::new()),
        }
    }

    /// Stop retrying and skip waves not yet started when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<BatchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `worker` over every item and return one outcome per item
    ///
    /// Failures are classified by `policy`: retryable kinds sleep for the
    /// configured delay and try the same item again, benign kinds become
    /// [`Outcome::Skipped`], everything else becomes [`Outcome::Failed`].
    ///
    /// The returned report always holds exactly `items.len()` entries. Items
    /// belonging to waves that never started because of cancellation are
    /// reported as failed with [`ItemError::Cancelled`].
    #[instrument(
        skip_all,
        fields(batch_id, total = items.len(), concurrency = self.config.concurrency)
    )]
    pub async fn execute<P, R, F, Fut>(
        &self,
        items: Vec<WorkItem<P>>,
        policy: ErrorPolicy,
        worker: F,
    ) -> BatchReport<P, R>
    where
        P: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(WorkItem<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, RemoteError>> + Send + 'static,
    {
        let batch_id = Uuid::now_v7();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));

        let started_at = Utc::now();
        let total = items.len();
        let width = self.config.concurrency.max(1);
        let worker = Arc::new(worker);
        let policy = Arc::new(policy);

        let mut reports: Vec<ItemReport<P, R>> = Vec::with_capacity(total);
        let mut queue = items.into_iter().enumerate();
        let mut wave_number = 0usize;

        loop {
            let wave: Vec<(usize, WorkItem<P>)> = queue.by_ref().take(width).collect();
            if wave.is_empty() {
                break;
            }
            wave_number += 1;

            if self.cancel.is_cancelled() {
                let remaining = wave.len() + queue.len();
                warn!(wave = wave_number, remaining, "Batch cancelled, remaining items not dispatched");
                reports.extend(wave.into_iter().chain(queue.by_ref()).map(|(index, item)| {
                    ItemReport {
                        index,
                        item,
                        outcome: Outcome::Failed(ItemError::Cancelled),
                        attempts: 0,
                    }
                }));
                break;
            }

            self.metrics.wave_started();
            info!(
                wave = wave_number,
                size = wave.len(),
                completed = reports.len(),
                total,
                "Dispatching wave"
            );

            let counters: Vec<Arc<AtomicU32>> =
                wave.iter().map(|_| Arc::new(AtomicU32::new(0))).collect();

            let handles: Vec<_> = wave
                .iter()
                .zip(&counters)
                .map(|((_, item), counter)| {
                    let item = item.clone();
                    let counter = Arc::clone(counter);
                    let worker = Arc::clone(&worker);
                    let policy = Arc::clone(&policy);
                    let retry = self.config.retry.clone();
                    let cancel = self.cancel.clone();
                    let metrics = Arc::clone(&self.metrics);

                    tokio::spawn(async move {
                        let ctx = AttemptContext {
                            policy: &policy,
                            retry: &retry,
                            cancel: &cancel,
                            metrics: &metrics,
                            attempts: &counter,
                        };
                        run_item(&item, worker.as_ref(), ctx).await
                    })
                })
                .collect();

            // Wave barrier
            let joined = futures::future::join_all(handles).await;

            for (((index, item), result), counter) in wave.into_iter().zip(joined).zip(counters) {
                let (outcome, attempts) = match result {
                    Ok(finished) => finished,
                    Err(join_error) => {
                        error!(item = %item.id, target = %item.target, "Worker task aborted: {}", join_error);
                        let error = if join_error.is_panic() {
                            ItemError::Panicked(join_error.to_string())
                        } else {
                            ItemError::Cancelled
                        };
                        (Outcome::Failed(error), counter.load(Ordering::Relaxed))
                    }
                };
                reports.push(ItemReport {
                    index,
                    item,
                    outcome,
                    attempts,
                });
            }
        }

        let report = BatchReport::new(batch_id, started_at, reports);
        info!(waves = wave_number, summary = %report.summary(), "Batch complete");
        report
    }

    /// Run `worker` for a single item in the current task, with the same
    /// retry and classification rules as [`execute`](Self::execute)
    pub async fn execute_one<P, R, F, Fut>(
        &self,
        item: WorkItem<P>,
        policy: &ErrorPolicy,
        worker: F,
    ) -> ItemReport<P, R>
    where
        P: Clone,
        F: Fn(WorkItem<P>) -> Fut,
        Fut: Future<Output = Result<R, RemoteError>>,
    {
        let attempts = AtomicU32::new(0);
        let ctx = AttemptContext {
            policy,
            retry: &self.config.retry,
            cancel: &self.cancel,
            metrics: &self.metrics,
            attempts: &attempts,
        };
        let (outcome, attempts) = run_item(&item, &worker, ctx).await;
        ItemReport {
            index: 0,
            item,
            outcome,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::ErrorKind;
    use crate::reliability::NotFoundPolicy;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("user{i}@example.com"), "group@example.com"))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.retry, RetryPolicy::fixed(Duration::from_secs(2)));
    }

    #[test]
    fn test_config_builder_clamps_concurrency() {
        let config = BatchConfig::new(0);
        assert_eq!(config.concurrency, 1);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_empty_input_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let report = BatchExecutor::new(BatchConfig::new(4))
            .execute(Vec::<WorkItem>::new(), ErrorPolicy::insert(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, RemoteError>(()) }
            })
            .await;

        assert!(report.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_every_item_gets_one_outcome() {
        for width in [1, 3, 7, 10] {
            let report = BatchExecutor::new(BatchConfig::new(width))
                .execute(items(10), ErrorPolicy::insert(), |item| async move {
                    Ok::<_, RemoteError>(item.id.len())
                })
                .await;

            assert_eq!(report.len(), 10);
            let ids: Vec<&str> = report.items().iter().map(|r| r.item.id.as_str()).collect();
            let expected: Vec<String> = (0..10).map(|i| format!("user{i}@example.com")).collect();
            assert_eq!(ids, expected);
            assert_eq!(report.summary().succeeded, 10);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waves_never_exceed_width() {
        let executor = BatchExecutor::new(BatchConfig::new(3));
        let metrics = executor.metrics();

        let report = executor
            .execute(items(10), ErrorPolicy::insert(), |_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, RemoteError>(())
            })
            .await;

        assert_eq!(report.len(), 10);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.peak_in_flight, 3);
        assert_eq!(snapshot.waves, 4);
        assert_eq!(snapshot.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retry_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let report = BatchExecutor::default()
            .execute(items(3), ErrorPolicy::insert(), move |item| {
                let counter = counter.clone();
                async move {
                    if item.id == "user1@example.com" && counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        return Err(RemoteError::from_status(503, "Service Unavailable"));
                    }
                    Ok(item.id)
                }
            })
            .await;

        assert!(report.is_clean());
        assert_eq!(report.summary().succeeded, 3);
        assert_eq!(report.items()[1].attempts, 3);
        assert_eq!(report.items()[0].attempts, 1);
        assert_eq!(report.items()[2].attempts, 1);
    }

    #[tokio::test]
    async fn test_duplicate_is_skipped_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let report = BatchExecutor::default()
            .execute(items(1), ErrorPolicy::insert(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RemoteError::from_status(409, "Member already exists.")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (_, reason) = report.skipped().next().unwrap();
        assert_eq!(reason.kind, ErrorKind::Duplicate);
    }

    #[tokio::test]
    async fn test_fatal_error_fails_item_only() {
        let report = BatchExecutor::new(BatchConfig::new(2))
            .execute(items(4), ErrorPolicy::insert(), |item| async move {
                if item.id == "user2@example.com" {
                    Err(RemoteError::from_status(400, "Invalid Input: memberKey"))
                } else {
                    Ok(())
                }
            })
            .await;

        let failed: Vec<_> = report.failed().map(|(item, _)| item.id.clone()).collect();
        assert_eq!(failed, vec!["user2@example.com"]);
        assert_eq!(report.summary().succeeded, 3);
    }

    #[tokio::test]
    async fn test_not_found_on_delete_follows_policy() {
        let worker = |_: WorkItem| async { Err::<(), _>(RemoteError::from_status(404, "Resource Not Found")) };

        let skipped = BatchExecutor::default()
            .execute(items(2), ErrorPolicy::delete(NotFoundPolicy::Skip), worker)
            .await;
        assert_eq!(skipped.summary().skipped, 2);

        let failed = BatchExecutor::default()
            .execute(items(2), ErrorPolicy::delete(NotFoundPolicy::Fail), worker)
            .await;
        assert_eq!(failed.summary().failed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling() {
        let config = BatchConfig::new(2).with_retry(RetryPolicy::default().with_max_attempts(4));

        let report = BatchExecutor::new(config)
            .execute(items(1), ErrorPolicy::insert(), |_| async {
                Err::<(), _>(RemoteError::quota("Quota exceeded"))
            })
            .await;

        let report = &report.items()[0];
        assert_eq!(report.attempts, 4);
        assert!(matches!(
            report.outcome,
            Outcome::Failed(ItemError::RetriesExhausted { attempts: 4, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_retries_and_later_waves() {
        let executor = BatchExecutor::new(BatchConfig::new(2));
        let token = executor.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        });

        let report = executor
            .execute(items(5), ErrorPolicy::insert(), |_| async {
                Err::<(), _>(RemoteError::unavailable("Backend Error"))
            })
            .await;

        assert_eq!(report.len(), 5);
        assert_eq!(report.summary().failed, 5);
        assert!(report
            .failed()
            .all(|(_, error)| matches!(error, ItemError::Cancelled)));
        assert_eq!(report.items()[4].attempts, 0);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reported() {
        let report = BatchExecutor::default()
            .execute(items(3), ErrorPolicy::insert(), |item| async move {
                if item.id == "user0@example.com" {
                    panic!("worker bug");
                }
                Ok::<_, RemoteError>(())
            })
            .await;

        assert_eq!(report.len(), 3);
        assert!(matches!(
            report.items()[0].outcome,
            Outcome::Failed(ItemError::Panicked(_))
        ));
        assert_eq!(report.summary().succeeded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_after_retries_keeps_attempt_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let report = BatchExecutor::default()
            .execute(items(1), ErrorPolicy::insert(), move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n >= 3 {
                        panic!("worker bug on attempt {n}");
                    }
                    Err::<(), _>(RemoteError::unavailable("Backend Error"))
                }
            })
            .await;

        let item = &report.items()[0];
        assert!(matches!(item.outcome, Outcome::Failed(ItemError::Panicked(_))));
        assert_eq!(item.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_invalid_backoff_and_jitter_rejected() {
        let mut config = BatchConfig::default();
        config.retry.backoff_coefficient = 0.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBackoffCoefficient(0.5)));

        config.retry.backoff_coefficient = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackoffCoefficient(c)) if c.is_nan()
        ));

        config.retry.backoff_coefficient = 1.0;
        config.retry.jitter = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::InvalidJitter(1.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_one() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        let report = BatchExecutor::default()
            .execute_one(
                WorkItem::with_payload("user@example.com", "group@example.com", "MEMBER"),
                &ErrorPolicy::insert(),
                move |item| {
                    let log = log.clone();
                    async move {
                        log.lock().push(item.payload);
                        if log.lock().len() < 2 {
                            Err(RemoteError::quota("Quota exceeded"))
                        } else {
                            Ok(item.id)
                        }
                    }
                },
            )
            .await;

        assert_eq!(report.attempts, 2);
        assert_eq!(report.outcome, Outcome::Succeeded("user@example.com".to_string()));
        assert_eq!(*seen.lock(), vec!["MEMBER", "MEMBER"]);
    }
}
