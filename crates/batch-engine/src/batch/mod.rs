//! Bulk operations
//!
//! This module provides:
//! - [`BatchExecutor`] - Applies one operation to many items in bounded waves
//! - [`fan_out`] / [`fan_out_keyed`] - Runs independent listings all at once
//! - [`BatchReport`] - One [`Outcome`] per submitted [`WorkItem`]
//!
//! # Architecture
//!
//! ```text
//! items ──► [ wave 1: w tasks ] ──barrier──► [ wave 2: w tasks ] ──► ... ──► BatchReport
//!                 │
//!                 ▼
//!           run_item: invoke ─► ErrorPolicy ─┬─ Retry ─► sleep(RetryPolicy) ─► invoke
//!                                            ├─ Skip  ─► Outcome::Skipped
//!                                            └─ Fail  ─► Outcome::Failed
//! ```

mod executor;
mod fanout;
mod metrics;
mod outcome;
mod worker;

pub use executor::{BatchConfig, BatchExecutor};
pub use fanout::{fan_out, fan_out_each, fan_out_keyed, FanOutFailure, FanOutResult, KeyedFanOut};
pub use metrics::{BatchMetrics, InFlightGuard, MetricsSnapshot};
pub use outcome::{
    BatchReport, BatchSummary, ItemError, ItemReport, Outcome, SkipReason, WorkItem,
};
