//! # Batch Engine
//!
//! Bounded-concurrency bulk operations against paginated remote resource APIs.
//!
//! ## Features
//!
//! - **Pagination**: Follows continuation tokens to the end of a listing and
//!   restarts from the first page after a quota backoff
//! - **Wave execution**: Applies one operation to many items, at most `w` at a
//!   time, with a barrier between waves
//! - **Retries**: Transient failures retry the same item after a fixed or
//!   exponential delay, with an optional attempt ceiling
//! - **Conflict skipping**: "already exists" and "already gone" are recorded as
//!   skipped instead of failed
//! - **Fan-out**: Independent listings run all at once and merge into one set
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Directory / Licensing / GroupsMigration           │
//! │   (resource clients scoped to one customer or domain)       │
//! └─────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │   Paginator    │  │  BatchExecutor   │  │     fan_out      │
//! │ (token chain)  │  │ (waves + retry)  │  │ (all at once)    │
//! └────────────────┘  └──────────────────┘  └──────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │      DirectoryService / LicenseService / ArchiveService      │
//! │  (caller-supplied transport, or InMemoryWorkspace in tests) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use batch_engine::prelude::*;
//!
//! let directory = Directory::connect(service, "admin@example.com", &EngineConfig::default()).await?;
//!
//! let report = directory
//!     .insert_members_by_email("staff@example.com", emails, MemberRole::Member, 20)
//!     .await;
//!
//! for (item, error) in report.failed() {
//!     tracing::error!(member = %item.id, error = %error, "Could not add member");
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod pagination;
pub mod reliability;
pub mod resource;

/// Prelude for common imports
pub mod prelude {
    pub use crate::batch::{
        fan_out, fan_out_keyed, BatchConfig, BatchExecutor, BatchReport, FanOutResult, ItemError,
        Outcome, WorkItem,
    };
    pub use crate::config::{ConfigError, EngineConfig};
    pub use crate::error::{ErrorKind, RemoteError};
    pub use crate::pagination::{
        ListingError, ListingResult, Page, PageRequest, Paginator, PaginatorConfig, PartialListing,
    };
    pub use crate::reliability::{ErrorPolicy, NotFoundPolicy, RetryPolicy};
    pub use crate::resource::{
        ArchiveService, Directory, DirectoryService, GroupsMigration, InMemoryWorkspace,
        LicenseService, Licensing, Member, MemberRole, Product, ProductCatalog, ResourceError,
    };
}

// Re-export key types at crate root
pub use batch::{
    fan_out, fan_out_each, fan_out_keyed, BatchConfig, BatchExecutor, BatchMetrics, BatchReport,
    BatchSummary, FanOutFailure, FanOutResult, ItemError, ItemReport, KeyedFanOut,
    MetricsSnapshot, Outcome, SkipReason, WorkItem,
};
pub use config::{ConfigError, EngineConfig};
pub use error::{ErrorKind, RemoteError};
pub use pagination::{
    ListingError, ListingResult, Page, PageRequest, Paginator, PaginatorConfig, PartialListing,
};
pub use reliability::{Disposition, ErrorPolicy, NotFoundPolicy, RetryPolicy};
pub use resource::{
    ArchiveService, Directory, DirectoryService, GroupsMigration, InMemoryWorkspace,
    LicenseService, Licensing, Product, ProductCatalog, ResourceError,
};
