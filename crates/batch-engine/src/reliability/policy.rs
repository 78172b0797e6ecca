//! Per-operation failure classification

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RemoteError};

/// What the executor does with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Sleep and try the same item again
    Retry,
    /// Record the item as skipped; the desired end state already holds
    Skip,
    /// Record the item as failed
    Fail,
}

/// How a delete treats a target that no longer exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    /// The target is already absent, so the delete is skipped
    #[default]
    Skip,
    /// Surface the missing target as a failure
    Fail,
}

/// Maps each [`ErrorKind`] to a [`Disposition`] for one kind of operation
///
/// # Example
///
/// ```
/// use batch_engine::{Disposition, ErrorPolicy, RemoteError};
///
/// let policy = ErrorPolicy::insert();
/// assert_eq!(policy.disposition(&RemoteError::duplicate("exists")), Disposition::Skip);
/// assert_eq!(policy.disposition(&RemoteError::quota("slow")), Disposition::Retry);
/// assert_eq!(policy.disposition(&RemoteError::fatal("bad")), Disposition::Fail);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    /// Kinds retried after the policy delay
    pub retryable: Vec<ErrorKind>,

    /// Kinds recorded as skipped
    pub benign: Vec<ErrorKind>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::transient_only()
    }
}

impl ErrorPolicy {
    /// Retry transient failures, fail everything else
    pub fn transient_only() -> Self {
        Self {
            retryable: vec![ErrorKind::Quota, ErrorKind::Unavailable],
            benign: vec![],
        }
    }

    /// Inserting something that already exists is skipped
    pub fn insert() -> Self {
        Self::transient_only().with_benign(ErrorKind::Duplicate)
    }

    /// Deleting something that is already gone follows `not_found`
    pub fn delete(not_found: NotFoundPolicy) -> Self {
        let policy = Self::transient_only();
        match not_found {
            NotFoundPolicy::Skip => policy.with_benign(ErrorKind::NotFound),
            NotFoundPolicy::Fail => policy,
        }
    }

    /// Updates have no benign conflicts
    pub fn update() -> Self {
        Self::transient_only()
    }

    /// Read-only lookups have no benign conflicts
    pub fn query() -> Self {
        Self::transient_only()
    }

    /// Add a benign kind
    pub fn with_benign(mut self, kind: ErrorKind) -> Self {
        self.retryable.retain(|k| *k != kind);
        if !self.benign.contains(&kind) {
            self.benign.push(kind);
        }
        self
    }

    /// Add a retryable kind
    pub fn with_retryable(mut self, kind: ErrorKind) -> Self {
        self.benign.retain(|k| *k != kind);
        if !self.retryable.contains(&kind) {
            self.retryable.push(kind);
        }
        self
    }

    /// Classify a failed attempt
    pub fn disposition(&self, error: &RemoteError) -> Disposition {
        if self.benign.contains(&error.kind) {
            Disposition::Skip
        } else if self.retryable.contains(&error.kind) {
            Disposition::Retry
        } else {
            Disposition::Fail
        }
    }
}
