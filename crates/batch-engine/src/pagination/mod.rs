//! Paginated listings
//!
//! This module provides:
//! - [`Page`] and [`PageRequest`] - One page of a listing and how to ask for it
//! - [`Paginator`] - Follows continuation tokens until the listing ends
//! - [`PartialListing`] - The items fetched before a listing failed

mod page;
mod paginator;

pub use page::{Page, PageRequest};
pub use paginator::{ListingError, ListingResult, PaginatorConfig, Paginator, PartialListing};
