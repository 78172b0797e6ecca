//! Directory client: users, groups and group membership

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::model::{Group, Member, MemberRole, User};
use super::service::{DirectoryService, ResourceError};
use crate::batch::{BatchConfig, BatchExecutor, BatchReport, Outcome, WorkItem};
use crate::config::{ConfigError, EngineConfig};
use crate::error::RemoteError;
use crate::pagination::{ListingResult, Paginator, PaginatorConfig, PartialListing};
use crate::reliability::{ErrorPolicy, NotFoundPolicy};

const USER_PAGE_SIZE: u32 = 500;
const MEMBER_PAGE_SIZE: u32 = 200;

/// Directory operations scoped to one customer and domain
///
/// # Example
///
/// ```ignore
/// let directory = Directory::connect(service, "admin@example.com", &EngineConfig::default()).await?;
///
/// let members = directory.members("staff@example.com", &[MemberRole::Member]).await?;
/// let emails = members.into_iter().map(|m| m.email).collect();
/// let report = directory.delete_members("staff@example.com", emails, 20).await;
/// println!("{}", report.summary());
/// ```
pub struct Directory<S> {
    service: Arc<S>,
    customer_id: String,
    admin_email: String,
    domain: String,
    batch: BatchConfig,
    pagination: PaginatorConfig,
    not_found: NotFoundPolicy,
    cancel: CancellationToken,
}

impl<S: DirectoryService> Directory<S> {
    /// Resolve the customer id of `admin_email` and bind to its domain
    #[instrument(skip(service, config))]
    pub async fn connect(
        service: Arc<S>,
        admin_email: &str,
        config: &EngineConfig,
    ) -> Result<Self, ResourceError> {
        config.validate()?;
        let domain = domain_of(admin_email)?;

        let admin = service.get_user(admin_email).await?;
        let customer_id = admin
            .customer_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ResourceError::MissingCustomerId(admin_email.to_string()))?;

        info!(customer_id = %customer_id, domain = %domain, "Directory client ready");

        Ok(Self {
            service,
            customer_id,
            admin_email: admin_email.to_string(),
            domain,
            batch: config.batch.clone(),
            pagination: config.pagination.clone(),
            not_found: NotFoundPolicy::default(),
            cancel: CancellationToken::new(),
        })
    }

    /// How deletes of members that are already gone are reported
    pub fn with_not_found_policy(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }

    /// Stop listings and batches started by this client when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Paginator for one listing; a configured page size wins over `default_size`
    fn paginator(&self, default_size: Option<u32>) -> Paginator {
        let mut config = self.pagination.clone();
        if config.page_size.is_none() {
            config.page_size = default_size;
        }
        Paginator::new(config).with_cancellation(self.cancel.clone())
    }

    fn executor(&self, width: usize) -> BatchExecutor {
        BatchExecutor::new(self.batch.clone().with_concurrency(width))
            .with_cancellation(self.cancel.clone())
    }

    /// Users of the domain matching `query`
    pub async fn query_users(&self, query: &str) -> ListingResult<User> {
        let service = self.service.as_ref();
        let domain = self.domain.as_str();
        self.paginator(Some(USER_PAGE_SIZE))
            .collect("users", move |page| {
                service.list_users(domain, Some(query), page)
            })
            .await
    }

    /// Groups of the domain, optionally filtered by `query`
    pub async fn groups(&self, query: Option<&str>) -> ListingResult<Group> {
        let service = self.service.as_ref();
        let domain = self.domain.as_str();
        self.paginator(None)
            .collect("groups", move |page| service.list_groups(domain, query, page))
            .await
    }

    pub async fn group_by_email(&self, group_email: &str) -> Result<Group, RemoteError> {
        self.service.get_group(group_email).await
    }

    /// Every group `user_email` belongs to, paired with its membership
    ///
    /// The membership lookups run as one batch as wide as the group list.
    /// Each report item carries the group as payload; a failed lookup shows
    /// up as a failed item rather than aborting the rest.
    #[instrument(skip(self))]
    pub async fn groups_by_user(
        &self,
        user_email: &str,
    ) -> Result<BatchReport<Group, Member>, PartialListing<Group>> {
        let query = format!("memberKey={user_email}");
        let groups = self.groups(Some(&query)).await?;
        info!(groups = groups.len(), "Looking up memberships");

        let width = groups.len();
        let items = groups
            .into_iter()
            .map(|group| WorkItem::with_payload(user_email, group.email.clone(), group))
            .collect();

        let service = Arc::clone(&self.service);
        Ok(self
            .executor(width)
            .execute(items, ErrorPolicy::query(), move |item: WorkItem<Group>| {
                let service = Arc::clone(&service);
                async move { service.get_member(&item.target, &item.id).await }
            })
            .await)
    }

    /// Members of a group holding any of `roles`; empty means every role
    pub async fn members(&self, group_email: &str, roles: &[MemberRole]) -> ListingResult<Member> {
        let roles_label = roles
            .iter()
            .map(MemberRole::as_str)
            .collect::<Vec<_>>()
            .join(",");
        info!(group = %group_email, roles = %roles_label, "Retrieving members");

        let service = self.service.as_ref();
        self.paginator(Some(MEMBER_PAGE_SIZE))
            .collect("members", move |page| {
                service.list_members(group_email, roles, page)
            })
            .await
    }

    /// Add one member, retrying transient failures
    pub async fn insert_member(&self, group_email: &str, member: Member) -> Outcome<Member> {
        let item = WorkItem::with_payload(member.email.clone(), group_email, member);
        let service = self.service.as_ref();
        self.executor(1)
            .execute_one(item, &ErrorPolicy::insert(), |item: WorkItem<Member>| async move {
                service.insert_member(&item.target, &item.payload).await
            })
            .await
            .outcome
    }

    /// Add members in waves of `width`; existing members are skipped
    #[instrument(skip(self, members), fields(total = members.len()))]
    pub async fn insert_members(
        &self,
        group_email: &str,
        members: Vec<Member>,
        width: usize,
    ) -> BatchReport<Member, Member> {
        let items = members
            .into_iter()
            .map(|member| WorkItem::with_payload(member.email.clone(), group_email, member))
            .collect();

        let service = Arc::clone(&self.service);
        self.executor(width)
            .execute(items, ErrorPolicy::insert(), move |item: WorkItem<Member>| {
                let service = Arc::clone(&service);
                async move { service.insert_member(&item.target, &item.payload).await }
            })
            .await
    }

    /// Add addresses with a single role
    pub async fn insert_members_by_email(
        &self,
        group_email: &str,
        emails: Vec<String>,
        role: MemberRole,
        width: usize,
    ) -> BatchReport<Member, Member> {
        let members = emails
            .into_iter()
            .map(|email| Member::new(email, role))
            .collect();
        self.insert_members(group_email, members, width).await
    }

    /// Remove one member, retrying transient failures
    pub async fn delete_member(&self, group_email: &str, member_email: &str) -> Outcome<()> {
        let service = self.service.as_ref();
        self.executor(1)
            .execute_one(
                WorkItem::new(member_email, group_email),
                &ErrorPolicy::delete(self.not_found),
                |item: WorkItem| async move { service.delete_member(&item.target, &item.id).await },
            )
            .await
            .outcome
    }

    /// Remove members in waves of `width`
    #[instrument(skip(self, member_emails), fields(total = member_emails.len()))]
    pub async fn delete_members(
        &self,
        group_email: &str,
        member_emails: Vec<String>,
        width: usize,
    ) -> BatchReport<(), ()> {
        let items = member_emails
            .into_iter()
            .map(|email| WorkItem::new(email, group_email))
            .collect();

        let service = Arc::clone(&self.service);
        self.executor(width)
            .execute(
                items,
                ErrorPolicy::delete(self.not_found),
                move |item: WorkItem| {
                    let service = Arc::clone(&service);
                    async move { service.delete_member(&item.target, &item.id).await }
                },
            )
            .await
    }
}

/// Domain part of an admin address
pub(crate) fn domain_of(email: &str) -> Result<String, ConfigError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(domain.to_string())
        }
        _ => Err(ConfigError::InvalidAdminEmail(email.to_string())),
    }
}
