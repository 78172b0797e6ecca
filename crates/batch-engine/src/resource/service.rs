//! Remote service interfaces
//!
//! The engine never talks HTTP itself. Callers hand in implementations of
//! these traits (a REST client, a recorded fixture, or
//! [`InMemoryWorkspace`](super::InMemoryWorkspace)) and the clients in this
//! module drive them through the paginator and the batch executor.

use async_trait::async_trait;

use super::model::{Group, ImportResult, LicenseAssignment, Member, MemberRole, User};
use crate::config::ConfigError;
use crate::error::RemoteError;
use crate::pagination::{Page, PageRequest};

/// Errors raised while building a resource client
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The admin account came back without a customer id
    #[error("no customer id for {0}")]
    MissingCustomerId(String),
}

/// Users, groups and group membership
#[async_trait]
pub trait DirectoryService: Send + Sync + 'static {
    /// Fetch one user by primary email or id
    async fn get_user(&self, user_key: &str) -> Result<User, RemoteError>;

    /// List users of `domain` matching `query`
    async fn list_users(
        &self,
        domain: &str,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>, RemoteError>;

    /// List groups of `domain`; a `memberKey=<email>` query limits the
    /// listing to groups containing that address
    async fn list_groups(
        &self,
        domain: &str,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Group>, RemoteError>;

    async fn get_group(&self, group_key: &str) -> Result<Group, RemoteError>;

    /// List members of a group; an empty role slice means every role
    async fn list_members(
        &self,
        group_key: &str,
        roles: &[MemberRole],
        page: PageRequest,
    ) -> Result<Page<Member>, RemoteError>;

    async fn get_member(&self, group_key: &str, member_key: &str) -> Result<Member, RemoteError>;

    async fn insert_member(&self, group_key: &str, member: &Member) -> Result<Member, RemoteError>;

    async fn delete_member(&self, group_key: &str, member_key: &str) -> Result<(), RemoteError>;
}

/// Product license assignments
#[async_trait]
pub trait LicenseService: Send + Sync + 'static {
    async fn list_for_product(
        &self,
        product_id: &str,
        customer_id: &str,
        page: PageRequest,
    ) -> Result<Page<LicenseAssignment>, RemoteError>;

    async fn list_for_product_and_sku(
        &self,
        product_id: &str,
        sku_id: &str,
        customer_id: &str,
        page: PageRequest,
    ) -> Result<Page<LicenseAssignment>, RemoteError>;

    async fn get_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<LicenseAssignment, RemoteError>;

    async fn insert_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<LicenseAssignment, RemoteError>;

    /// Move the assignment at `product_id`/`sku_id` to the SKU in `assignment`
    async fn update_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
        assignment: &LicenseAssignment,
    ) -> Result<LicenseAssignment, RemoteError>;

    async fn delete_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<(), RemoteError>;
}

/// Group mail archive
#[async_trait]
pub trait ArchiveService: Send + Sync + 'static {
    /// Import one RFC 822 message into the archive of `group_key`
    async fn insert_message(
        &self,
        group_key: &str,
        message: &[u8],
    ) -> Result<ImportResult, RemoteError>;
}
