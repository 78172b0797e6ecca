//! Work items, per-item outcomes and the batch report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, RemoteError};

/// One unit of work: an item identifier, the resource it targets, and any
/// payload the worker needs
///
/// For a group membership insert the id is the member email, the target is
/// the group address and the payload is the member record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem<P = ()> {
    pub id: String,
    pub target: String,
    pub payload: P,
}

impl WorkItem<()> {
    /// Item without payload
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            payload: (),
        }
    }
}

impl<P> WorkItem<P> {
    pub fn with_payload(id: impl Into<String>, target: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            payload,
        }
    }
}

/// Why an item was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReason {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<RemoteError> for SkipReason {
    fn from(err: RemoteError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Why an item failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ItemError {
    /// The remote call failed with a non-retryable error
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Transient failures outlasted the retry ceiling
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: RemoteError },

    /// The batch was cancelled before the item reached a result
    #[error("cancelled")]
    Cancelled,

    /// The worker task panicked
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Terminal result for one item
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R> {
    Succeeded(R),
    Skipped(SkipReason),
    Failed(ItemError),
}

impl<R> Outcome<R> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn as_succeeded(&self) -> Option<&R> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_succeeded(self) -> Option<R> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }
}

/// Outcome of one submitted item together with the item itself
#[derive(Debug, Clone)]
pub struct ItemReport<P, R> {
    /// Position of the item in the submitted sequence
    pub index: usize,
    pub item: WorkItem<P>,
    pub outcome: Outcome<R>,
    /// Worker invocations made for this item
    pub attempts: u32,
}

/// Outcome counts for a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} submitted, {} succeeded, {} skipped, {} failed",
            self.submitted, self.succeeded, self.skipped, self.failed
        )
    }
}

/// Result collection of a batch: exactly one [`ItemReport`] per submitted item
#[derive(Debug, Clone)]
pub struct BatchReport<P, R> {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    items: Vec<ItemReport<P, R>>,
}

impl<P, R> BatchReport<P, R> {
    pub(crate) fn new(
        batch_id: Uuid,
        started_at: DateTime<Utc>,
        mut items: Vec<ItemReport<P, R>>,
    ) -> Self {
        items.sort_by_key(|report| report.index);
        Self {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reports in submission order
    pub fn items(&self) -> &[ItemReport<P, R>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ItemReport<P, R>> {
        self.items
    }

    /// Items that succeeded, with their results
    pub fn succeeded(&self) -> impl Iterator<Item = (&WorkItem<P>, &R)> {
        self.items
            .iter()
            .filter_map(|report| report.outcome.as_succeeded().map(|r| (&report.item, r)))
    }

    /// Items that were skipped, with the reason
    pub fn skipped(&self) -> impl Iterator<Item = (&WorkItem<P>, &SkipReason)> {
        self.items.iter().filter_map(|report| match &report.outcome {
            Outcome::Skipped(reason) => Some((&report.item, reason)),
            _ => None,
        })
    }

    /// Items that failed, with the error
    pub fn failed(&self) -> impl Iterator<Item = (&WorkItem<P>, &ItemError)> {
        self.items.iter().filter_map(|report| match &report.outcome {
            Outcome::Failed(error) => Some((&report.item, error)),
            _ => None,
        })
    }

    /// Take just the successful results
    pub fn into_succeeded(self) -> Vec<R> {
        self.items
            .into_iter()
            .filter_map(|report| report.outcome.into_succeeded())
            .collect()
    }

    /// Whether every item succeeded or was skipped
    pub fn is_clean(&self) -> bool {
        self.items.iter().all(|report| !report.outcome.is_failed())
    }

    pub fn summary(&self) -> BatchSummary {
        self.items.iter().fold(
            BatchSummary {
                submitted: self.items.len(),
                ..Default::default()
            },
            |mut summary, report| {
                match report.outcome {
                    Outcome::Succeeded(_) => summary.succeeded += 1,
                    Outcome::Skipped(_) => summary.skipped += 1,
                    Outcome::Failed(_) => summary.failed += 1,
                }
                summary
            },
        )
    }
}
