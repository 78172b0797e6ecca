//! Full-parallel read-only fan-out
//!
//! Every query runs as its own task at once; there is no wave limit because
//! the number of queries is small and bounded (one per product, one per
//! category). Each query usually drives a [`Paginator`](crate::Paginator).

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::pagination::{ListingError, ListingResult, PartialListing};

/// A query that did not return its full listing
#[derive(Debug)]
pub struct FanOutFailure<Q, T> {
    pub query: Q,
    pub error: PartialListing<T>,
}

/// Union of every successful listing plus the queries that failed
#[derive(Debug)]
pub struct FanOutResult<Q, T> {
    /// Items of all successful queries, grouped in query order
    pub items: Vec<T>,
    pub failures: Vec<FanOutFailure<Q, T>>,
}

impl<Q, T> FanOutResult<Q, T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One listing per query key plus the queries that failed
#[derive(Debug)]
pub struct KeyedFanOut<Q, T> {
    pub results: HashMap<Q, Vec<T>>,
    pub failures: Vec<FanOutFailure<Q, T>>,
}

/// Run every query concurrently and return each result in query order
#[instrument(skip_all, fields(queries = queries.len()))]
pub async fn fan_out_each<Q, T, F, Fut>(queries: Vec<Q>, query: F) -> Vec<(Q, ListingResult<T>)>
where
    Q: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListingResult<T>> + Send + 'static,
{
    info!(queries = queries.len(), "Fanning out queries");

    let query = Arc::new(query);
    let handles: Vec<_> = queries
        .iter()
        .cloned()
        .map(|q| {
            let query = Arc::clone(&query);
            tokio::spawn(async move { query(q).await })
        })
        .collect();

    let joined = futures::future::join_all(handles).await;

    queries
        .into_iter()
        .zip(joined)
        .map(|(q, result)| {
            let result = result.unwrap_or_else(|join_error| {
                error!("Fan-out query task aborted: {}", join_error);
                Err(PartialListing::new(
                    Vec::new(),
                    ListingError::Aborted(join_error.to_string()),
                ))
            });
            (q, result)
        })
        .collect()
}

/// Run every query concurrently and merge the listings into one set
///
/// # Example
///
/// ```ignore
/// let result = fan_out(products, move |product| {
///     let licensing = licensing.clone();
///     async move { licensing.list_for_product_and_sku(&product).await }
/// })
/// .await;
/// ```
pub async fn fan_out<Q, T, F, Fut>(queries: Vec<Q>, query: F) -> FanOutResult<Q, T>
where
    Q: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListingResult<T>> + Send + 'static,
{
    let mut items = Vec::new();
    let mut failures = Vec::new();

    for (q, result) in fan_out_each(queries, query).await {
        match result {
            Ok(listing) => items.extend(listing),
            Err(error) => {
                warn!(error = %error, "Fan-out query failed");
                failures.push(FanOutFailure { query: q, error });
            }
        }
    }

    FanOutResult { items, failures }
}

/// Run every query concurrently and keep each listing under its query key
pub async fn fan_out_keyed<Q, T, F, Fut>(queries: Vec<Q>, query: F) -> KeyedFanOut<Q, T>
where
    Q: Clone + Eq + Hash + Send + 'static,
    T: Send + 'static,
    F: Fn(Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListingResult<T>> + Send + 'static,
{
    let mut results = HashMap::new();
    let mut failures = Vec::new();

    for (q, result) in fan_out_each(queries, query).await {
        match result {
            Ok(listing) => {
                results.insert(q, listing);
            }
            Err(error) => {
                warn!(error = %error, "Fan-out query failed");
                failures.push(FanOutFailure { query: q, error });
            }
        }
    }

    KeyedFanOut { results, failures }
}
