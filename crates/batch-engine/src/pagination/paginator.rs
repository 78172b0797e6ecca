//! Continuation-token paginator
//!
//! Fetches every page of a listing sequentially and returns the concatenated
//! items. Quota errors restart the listing from the first page.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::page::{Page, PageRequest};
use crate::config::duration_millis;
use crate::error::{ErrorKind, RemoteError};

/// Paginator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginatorConfig {
    /// Page size hint sent with every request
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Wait before restarting a listing that hit a quota error
    #[serde(with = "duration_millis")]
    pub quota_backoff: Duration,

    /// Restarts allowed per listing; `None` restarts forever
    #[serde(default)]
    pub max_restarts: Option<u32>,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            quota_backoff: Duration::from_secs(3),
            max_restarts: None,
        }
    }
}

impl PaginatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size hint
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Set the quota backoff
    pub fn with_quota_backoff(mut self, backoff: Duration) -> Self {
        self.quota_backoff = backoff;
        self
    }

    /// Cap the number of quota restarts
    pub fn with_max_restarts(mut self, restarts: u32) -> Self {
        self.max_restarts = Some(restarts);
        self
    }
}

/// Why a listing stopped before reaching its last page
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    /// Non-quota remote failure
    #[error("listing failed: {0}")]
    Remote(#[from] RemoteError),

    /// Quota errors kept recurring past the restart ceiling
    #[error("listing abandoned after {restarts} quota restarts: {last}")]
    RestartsExhausted { restarts: u32, last: RemoteError },

    /// The cancellation token fired
    #[error("listing was cancelled")]
    Cancelled,

    /// The task running the listing panicked or was aborted
    #[error("listing task aborted: {0}")]
    Aborted(String),
}

/// A listing that stopped early, with the items fetched before it stopped
///
/// The caller decides whether the partial data is usable.
#[derive(Debug, thiserror::Error)]
#[error("listing aborted after {} items: {source}", .partial.len())]
pub struct PartialListing<T> {
    /// Items fetched before the failure, in page order
    pub partial: Vec<T>,

    /// What stopped the listing
    #[source]
    pub source: ListingError,
}

impl<T> PartialListing<T> {
    pub fn new(partial: Vec<T>, source: ListingError) -> Self {
        Self { partial, source }
    }

    /// Take the items fetched before the failure
    pub fn into_partial(self) -> Vec<T> {
        self.partial
    }

    /// Remote error that ended the listing, if there was one
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match &self.source {
            ListingError::Remote(err) => Some(err),
            ListingError::RestartsExhausted { last, .. } => Some(last),
            ListingError::Cancelled | ListingError::Aborted(_) => None,
        }
    }
}

/// Listing result: every item, or the partial items plus the reason
pub type ListingResult<T> = Result<Vec<T>, PartialListing<T>>;

/// Drives a page-fetch function until the listing ends
///
/// # Example
///
/// ```ignore
/// use batch_engine::{Page, Paginator, PaginatorConfig};
///
/// let paginator = Paginator::new(PaginatorConfig::new().with_page_size(200));
///
/// let members = paginator
///     .collect("group members", |request| {
///         let service = service.clone();
///         async move { service.list_members("staff@example.com", &[], request).await }
///     })
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    config: PaginatorConfig,
    cancel: CancellationToken,
}

impl Paginator {
    pub fn new(config: PaginatorConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop listings (between pages and during backoff) when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    /// Fetch every page and return the items in page order
    ///
    /// The listing ends on an empty or absent continuation token, or on a
    /// page with no items. Some endpoints keep handing out a stale token
    /// after the data runs out, so both signals are honored.
    ///
    /// A quota error discards everything fetched so far, waits for
    /// `quota_backoff`, and starts again from the first page. The remote API
    /// makes no promise that a token survives the pause. Any other error
    /// ends the listing with [`PartialListing`].
    #[instrument(skip(self, fetch), fields(listing = %label))]
    pub async fn collect<T, F, Fut>(&self, label: &str, mut fetch: F) -> ListingResult<T>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, RemoteError>>,
    {
        let mut restarts = 0u32;

        'listing: loop {
            let mut items: Vec<T> = Vec::new();
            let mut request = PageRequest::first(self.config.page_size);
            let mut pages = 0usize;

            loop {
                if self.cancel.is_cancelled() {
                    return Err(PartialListing::new(items, ListingError::Cancelled));
                }

                let page = match fetch(request.clone()).await {
                    Ok(page) => page,
                    Err(err) if err.kind == ErrorKind::Quota => {
                        if let Some(max) = self.config.max_restarts {
                            if restarts >= max {
                                warn!(restarts, error = %err, "Quota restarts exhausted");
                                return Err(PartialListing::new(
                                    items,
                                    ListingError::RestartsExhausted { restarts, last: err },
                                ));
                            }
                        }
                        restarts += 1;
                        warn!(
                            restarts,
                            discarded = items.len(),
                            backoff_ms = self.config.quota_backoff.as_millis() as u64,
                            error = %err,
                            "Quota exceeded, restarting listing"
                        );
                        if self.backoff().await {
                            return Err(PartialListing::new(items, ListingError::Cancelled));
                        }
                        continue 'listing;
                    }
                    Err(err) => {
                        warn!(pages, fetched = items.len(), error = %err, "Listing aborted");
                        return Err(PartialListing::new(items, ListingError::Remote(err)));
                    }
                };

                pages += 1;

                if page.is_empty() {
                    debug!(pages, "Empty page, no further items");
                    break;
                }

                let next = page.continuation().map(str::to_owned);
                items.extend(page.items);
                debug!(pages, total = items.len(), "Fetched page");

                match next {
                    Some(token) => request = PageRequest::after(token, self.config.page_size),
                    None => break,
                }
            }

            info!(total = items.len(), pages, restarts, "Listing complete");
            return Ok(items);
        }
    }

    /// Sleep for the quota backoff; returns true if cancelled meanwhile
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.config.quota_backoff) => false,
            _ = self.cancel.cancelled() => {
                debug!("Cancelled during quota backoff");
                true
            }
        }
    }
}
