//! Batch execution counters
//!
//! Lock-free counters shared by every worker task of an executor.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters for an executor
#[derive(Debug, Default)]
pub struct BatchMetrics {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    attempts: AtomicU64,
    retries: AtomicU64,
    waves: AtomicU64,
}

/// Point-in-time copy of [`BatchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub attempts: u64,
    pub retries: u64,
    pub waves: u64,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a worker invocation; the returned guard marks it finished on drop
    pub fn attempt_started(&self) -> InFlightGuard<'_> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { metrics: self }
    }

    pub fn retry_scheduled(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn wave_started(&self) {
        self.waves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of simultaneous worker invocations observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            waves: self.waves.load(Ordering::Relaxed),
        }
    }
}

/// Decrements the in-flight count when dropped
#[must_use = "the invocation is counted as finished when the guard drops"]
pub struct InFlightGuard<'a> {
    metrics: &'a BatchMetrics,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
