//! Resource clients built on the engine
//!
//! This module provides:
//! - [`DirectoryService`], [`LicenseService`] and [`ArchiveService`] traits
//!   implemented by the caller's transport
//! - [`Directory`], [`Licensing`] and [`GroupsMigration`] clients that drive
//!   those services through the paginator, executor and fan-out
//! - [`ProductCatalog`] for license SKUs
//! - [`InMemoryWorkspace`] for testing

mod catalog;
mod directory;
mod licensing;
mod memory;
mod migration;
mod model;
mod service;

pub use catalog::{Product, ProductCatalog};
pub use directory::Directory;
pub use licensing::Licensing;
pub use memory::{Fault, InMemoryWorkspace, Operation};
pub use migration::{GroupsMigration, Message};
pub use model::{Group, ImportResult, LicenseAssignment, Member, MemberRole, User};
pub use service::{ArchiveService, DirectoryService, LicenseService, ResourceError};
