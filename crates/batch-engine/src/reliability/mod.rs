//! Reliability patterns for remote calls
//!
//! This module provides:
//! - [`RetryPolicy`] - Fixed or exponential delay between attempts of one item
//! - [`ErrorPolicy`] - Which failures are retried, skipped, or surfaced

mod policy;
mod retry;

pub use policy::{Disposition, ErrorPolicy, NotFoundPolicy};
pub use retry::RetryPolicy;
