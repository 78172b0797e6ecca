//! In-memory implementation of the resource services for testing

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::model::{Group, ImportResult, LicenseAssignment, Member, MemberRole, User};
use super::service::{ArchiveService, DirectoryService, LicenseService};
use crate::error::RemoteError;
use crate::pagination::{Page, PageRequest};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Service call identifiers used for fault injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetUser,
    ListUsers,
    ListGroups,
    GetGroup,
    ListMembers,
    GetMember,
    InsertMember,
    DeleteMember,
    ListLicenses,
    GetLicense,
    InsertLicense,
    UpdateLicense,
    DeleteLicense,
    InsertMessage,
}

/// A scripted failure
///
/// Matches calls of one [`Operation`], optionally only for one subject. The
/// subject is the member email for member writes, the group for member and
/// archive listings, the SKU for license listings, and the user for license
/// writes.
#[derive(Debug, Clone)]
pub struct Fault {
    operation: Operation,
    subject: Option<String>,
    error: RemoteError,
    skip: usize,
    remaining: Option<usize>,
}

impl Fault {
    /// Fail the next matching call once
    pub fn new(operation: Operation, error: RemoteError) -> Self {
        Self {
            operation,
            subject: None,
            error,
            skip: 0,
            remaining: Some(1),
        }
    }

    pub fn for_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Let the first `calls` matching calls through before failing
    pub fn after_calls(mut self, calls: usize) -> Self {
        self.skip = calls;
        self
    }

    pub fn times(mut self, times: usize) -> Self {
        self.remaining = Some(times);
        self
    }

    pub fn always(mut self) -> Self {
        self.remaining = None;
        self
    }

    fn matches(&self, operation: Operation, subject: &str) -> bool {
        self.operation == operation
            && self.remaining != Some(0)
            && self.subject.as_deref().is_none_or(|s| s == subject)
    }
}

/// In-memory directory, licensing and archive backend
///
/// Listings are paged with offset tokens, so continuation and quota-restart
/// behavior can be exercised without a network.
///
/// # Example
///
/// ```
/// use batch_engine::resource::{Group, InMemoryWorkspace, Member, MemberRole, User};
///
/// let workspace = InMemoryWorkspace::new()
///     .with_user(User::new("1", "admin@example.com").with_customer_id("C01"))
///     .with_group(Group::new("g1", "staff@example.com", "Staff"))
///     .with_member("staff@example.com", Member::new("ana@example.com", MemberRole::Member));
///
/// assert_eq!(workspace.members_of("staff@example.com").len(), 1);
/// ```
pub struct InMemoryWorkspace {
    users: RwLock<Vec<User>>,
    groups: RwLock<Vec<Group>>,
    members: RwLock<HashMap<String, Vec<Member>>>,
    licenses: RwLock<Vec<LicenseAssignment>>,
    archives: RwLock<HashMap<String, Vec<Vec<u8>>>>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<HashMap<Operation, usize>>,
    page_size: usize,
    latency: Option<Duration>,
}

impl Default for InMemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            groups: RwLock::new(Vec::new()),
            members: RwLock::new(HashMap::new()),
            licenses: RwLock::new(Vec::new()),
            archives: RwLock::new(HashMap::new()),
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
        }
    }

    /// Page size used when a request carries no hint
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.write().push(user);
        self
    }

    /// Add a group with an empty member list
    pub fn with_group(self, group: Group) -> Self {
        self.members.write().entry(group.email.clone()).or_default();
        self.groups.write().push(group);
        self
    }

    pub fn with_member(self, group_email: &str, member: Member) -> Self {
        self.members
            .write()
            .entry(group_email.to_string())
            .or_default()
            .push(member);
        self
    }

    pub fn with_license(self, assignment: LicenseAssignment) -> Self {
        self.licenses.write().push(assignment);
        self
    }

    /// Script a failure
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    /// Number of calls made to `operation`, failed ones included
    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    pub fn members_of(&self, group_email: &str) -> Vec<Member> {
        self.members
            .read()
            .get(group_email)
            .cloned()
            .unwrap_or_default()
    }

    pub fn licenses(&self) -> Vec<LicenseAssignment> {
        self.licenses.read().clone()
    }

    pub fn archive(&self, group_email: &str) -> Vec<Vec<u8>> {
        self.archives
            .read()
            .get(group_email)
            .cloned()
            .unwrap_or_default()
    }

    /// Count the call, apply latency, and fire a matching fault if any
    async fn enter(&self, operation: Operation, subject: &str) -> Result<(), RemoteError> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self.faults.lock();
        let Some(fault) = faults
            .iter_mut()
            .find(|fault| fault.matches(operation, subject))
        else {
            return Ok(());
        };

        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }
        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining -= 1;
        }
        Err(fault.error.clone())
    }

    fn paginate<T: Clone>(&self, all: Vec<T>, request: &PageRequest) -> Result<Page<T>, RemoteError> {
        let offset = match request.token.as_deref() {
            None | Some("") => 0,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RemoteError::from_status(400, "Invalid page token"))?,
        };
        let size = request
            .page_size
            .map(|size| size as usize)
            .unwrap_or(self.page_size)
            .max(1);

        let items: Vec<T> = all.iter().skip(offset).take(size).cloned().collect();
        let next = offset + items.len();
        if next < all.len() {
            Ok(Page::new(items, next.to_string()))
        } else {
            Ok(Page::last(items))
        }
    }
}

fn in_domain(email: &str, domain: &str) -> bool {
    email
        .rsplit_once('@')
        .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain))
}

fn license_missing() -> RemoteError {
    RemoteError::from_status(
        404,
        "User does not have a license for specified sku and product",
    )
}

#[async_trait]
impl DirectoryService for InMemoryWorkspace {
    async fn get_user(&self, user_key: &str) -> Result<User, RemoteError> {
        self.enter(Operation::GetUser, user_key).await?;
        self.users
            .read()
            .iter()
            .find(|u| u.primary_email == user_key || u.id == user_key)
            .cloned()
            .ok_or_else(|| RemoteError::from_status(404, "Resource Not Found: userKey"))
    }

    async fn list_users(
        &self,
        domain: &str,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<User>, RemoteError> {
        self.enter(Operation::ListUsers, domain).await?;
        let query = query.unwrap_or_default();
        let users: Vec<User> = self
            .users
            .read()
            .iter()
            .filter(|u| in_domain(&u.primary_email, domain))
            .filter(|u| u.primary_email.contains(query))
            .cloned()
            .collect();
        self.paginate(users, &page)
    }

    async fn list_groups(
        &self,
        domain: &str,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Group>, RemoteError> {
        self.enter(Operation::ListGroups, domain).await?;
        let members = self.members.read();
        let groups: Vec<Group> = self
            .groups
            .read()
            .iter()
            .filter(|g| in_domain(&g.email, domain))
            .filter(|g| match query {
                None => true,
                Some(q) => match q.strip_prefix("memberKey=") {
                    Some(key) => members
                        .get(&g.email)
                        .is_some_and(|list| list.iter().any(|m| m.email == key)),
                    None => g.email.contains(q) || g.name.contains(q),
                },
            })
            .cloned()
            .collect();
        drop(members);
        self.paginate(groups, &page)
    }

    async fn get_group(&self, group_key: &str) -> Result<Group, RemoteError> {
        self.enter(Operation::GetGroup, group_key).await?;
        self.groups
            .read()
            .iter()
            .find(|g| g.email == group_key || g.id == group_key)
            .cloned()
            .ok_or_else(|| RemoteError::from_status(404, "Resource Not Found: groupKey"))
    }

    async fn list_members(
        &self,
        group_key: &str,
        roles: &[MemberRole],
        page: PageRequest,
    ) -> Result<Page<Member>, RemoteError> {
        self.enter(Operation::ListMembers, group_key).await?;
        let members: Vec<Member> = self
            .members
            .read()
            .get(group_key)
            .ok_or_else(|| RemoteError::from_status(404, "Resource Not Found: groupKey"))?
            .iter()
            .filter(|m| roles.is_empty() || roles.contains(&m.role))
            .cloned()
            .collect();
        self.paginate(members, &page)
    }

    async fn get_member(&self, group_key: &str, member_key: &str) -> Result<Member, RemoteError> {
        self.enter(Operation::GetMember, member_key).await?;
        self.members
            .read()
            .get(group_key)
            .and_then(|list| list.iter().find(|m| m.email == member_key))
            .cloned()
            .ok_or_else(|| RemoteError::from_status(404, "Resource Not Found: memberKey"))
    }

    async fn insert_member(&self, group_key: &str, member: &Member) -> Result<Member, RemoteError> {
        self.enter(Operation::InsertMember, &member.email).await?;
        let mut members = self.members.write();
        let list = members
            .get_mut(group_key)
            .ok_or_else(|| RemoteError::from_status(404, "Resource Not Found: groupKey"))?;
        if list.iter().any(|m| m.email == member.email) {
            return Err(RemoteError::from_status(409, "Member already exists."));
        }

        let mut stored = member.clone();
        stored.id.get_or_insert_with(|| uuid::Uuid::now_v7().to_string());
        stored.status.get_or_insert_with(|| "ACTIVE".to_string());
        list.push(stored.clone());
        Ok(stored)
    }

    async fn delete_member(&self, group_key: &str, member_key: &str) -> Result<(), RemoteError> {
        self.enter(Operation::DeleteMember, member_key).await?;
        let mut members = self.members.write();
        let list = members
            .get_mut(group_key)
            .ok_or_else(|| RemoteError::from_status(404, "Resource Not Found: groupKey"))?;
        let before = list.len();
        list.retain(|m| m.email != member_key);
        if list.len() == before {
            return Err(RemoteError::from_status(404, "Resource Not Found: memberKey"));
        }
        Ok(())
    }
}

#[async_trait]
impl LicenseService for InMemoryWorkspace {
    async fn list_for_product(
        &self,
        product_id: &str,
        _customer_id: &str,
        page: PageRequest,
    ) -> Result<Page<LicenseAssignment>, RemoteError> {
        self.enter(Operation::ListLicenses, product_id).await?;
        let licenses: Vec<LicenseAssignment> = self
            .licenses
            .read()
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect();
        self.paginate(licenses, &page)
    }

    async fn list_for_product_and_sku(
        &self,
        product_id: &str,
        sku_id: &str,
        _customer_id: &str,
        page: PageRequest,
    ) -> Result<Page<LicenseAssignment>, RemoteError> {
        self.enter(Operation::ListLicenses, sku_id).await?;
        let licenses: Vec<LicenseAssignment> = self
            .licenses
            .read()
            .iter()
            .filter(|l| l.product_id == product_id && l.sku_id == sku_id)
            .cloned()
            .collect();
        self.paginate(licenses, &page)
    }

    async fn get_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<LicenseAssignment, RemoteError> {
        self.enter(Operation::GetLicense, user_id).await?;
        self.licenses
            .read()
            .iter()
            .find(|l| l.product_id == product_id && l.sku_id == sku_id && l.user_id == user_id)
            .cloned()
            .ok_or_else(license_missing)
    }

    async fn insert_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<LicenseAssignment, RemoteError> {
        self.enter(Operation::InsertLicense, user_id).await?;
        let mut licenses = self.licenses.write();
        if licenses
            .iter()
            .any(|l| l.product_id == product_id && l.sku_id == sku_id && l.user_id == user_id)
        {
            return Err(RemoteError::from_status(
                400,
                "User already has a license for the specified product and SKU",
            ));
        }
        let assignment = LicenseAssignment::new(product_id, sku_id, user_id);
        licenses.push(assignment.clone());
        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
        assignment: &LicenseAssignment,
    ) -> Result<LicenseAssignment, RemoteError> {
        self.enter(Operation::UpdateLicense, user_id).await?;
        let mut licenses = self.licenses.write();
        let current = licenses
            .iter_mut()
            .find(|l| l.product_id == product_id && l.sku_id == sku_id && l.user_id == user_id)
            .ok_or_else(license_missing)?;
        current.product_id = assignment.product_id.clone();
        current.sku_id = assignment.sku_id.clone();
        current.sku_name = assignment.sku_name.clone();
        Ok(current.clone())
    }

    async fn delete_assignment(
        &self,
        product_id: &str,
        sku_id: &str,
        user_id: &str,
    ) -> Result<(), RemoteError> {
        self.enter(Operation::DeleteLicense, user_id).await?;
        let mut licenses = self.licenses.write();
        let before = licenses.len();
        licenses
            .retain(|l| !(l.product_id == product_id && l.sku_id == sku_id && l.user_id == user_id));
        if licenses.len() == before {
            return Err(license_missing());
        }
        Ok(())
    }
}

#[async_trait]
impl ArchiveService for InMemoryWorkspace {
    async fn insert_message(
        &self,
        group_key: &str,
        message: &[u8],
    ) -> Result<ImportResult, RemoteError> {
        self.enter(Operation::InsertMessage, group_key).await?;
        if !self.groups.read().iter().any(|g| g.email == group_key) {
            return Err(RemoteError::from_status(404, "Resource Not Found: groupKey"));
        }

        let mut archives = self.archives.write();
        let archive = archives.entry(group_key.to_string()).or_default();
        if archive.iter().any(|stored| stored.as_slice() == message) {
            return Err(RemoteError::from_status(409, "Duplicate message"));
        }
        archive.push(message.to_vec());
        Ok(ImportResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn workspace() -> InMemoryWorkspace {
        InMemoryWorkspace::new()
            .with_page_size(2)
            .with_group(Group::new("g1", "staff@example.com", "Staff"))
            .with_group(Group::new("g2", "ops@example.com", "Ops"))
            .with_member("staff@example.com", Member::new("ana@example.com", MemberRole::Owner))
            .with_member("staff@example.com", Member::new("bo@example.com", MemberRole::Member))
            .with_member("staff@example.com", Member::new("cy@example.com", MemberRole::Member))
    }

    #[tokio::test]
    async fn test_pages_with_offset_tokens() {
        let ws = workspace();

        let first = ws
            .list_members("staff@example.com", &[], PageRequest::first(None))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.continuation(), Some("2"));

        let second = ws
            .list_members("staff@example.com", &[], PageRequest::after("2", None))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.continuation(), None);

        let err = ws
            .list_members("staff@example.com", &[], PageRequest::after("bogus", None))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Fatal);
    }

    #[test]
    fn test_get_user_by_email_or_id() {
        let ws = InMemoryWorkspace::new()
            .with_user(User::new("42", "admin@example.com").with_customer_id("C01"));

        let by_email = tokio_test::block_on(ws.get_user("admin@example.com")).unwrap();
        let by_id = tokio_test::block_on(ws.get_user("42")).unwrap();
        assert_eq!(by_email, by_id);

        let missing = tokio_test::block_on(ws.get_user("ghost@example.com")).unwrap_err();
        assert_eq!(missing.kind, ErrorKind::NotFound);
        assert_eq!(ws.call_count(Operation::GetUser), 3);
    }

    #[tokio::test]
    async fn test_role_filter() {
        let ws = workspace();
        let owners = ws
            .list_members("staff@example.com", &[MemberRole::Owner], PageRequest::first(None))
            .await
            .unwrap();
        assert_eq!(owners.items.len(), 1);
        assert_eq!(owners.items[0].email, "ana@example.com");
    }

    #[tokio::test]
    async fn test_member_conflicts_are_classified() {
        let ws = workspace();

        let dup = ws
            .insert_member("staff@example.com", &Member::new("bo@example.com", MemberRole::Member))
            .await
            .unwrap_err();
        assert_eq!(dup.kind, ErrorKind::Duplicate);

        let missing = ws
            .delete_member("staff@example.com", "nobody@example.com")
            .await
            .unwrap_err();
        assert_eq!(missing.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_member_key_query() {
        let ws = workspace();
        let groups = ws
            .list_groups("example.com", Some("memberKey=bo@example.com"), PageRequest::first(None))
            .await
            .unwrap();
        assert_eq!(groups.items.len(), 1);
        assert_eq!(groups.items[0].email, "staff@example.com");
    }

    #[tokio::test]
    async fn test_fault_injection_after_calls() {
        let ws = workspace();
        ws.inject(
            Fault::new(Operation::GetMember, RemoteError::unavailable("backend error"))
                .for_subject("ana@example.com")
                .after_calls(1)
                .times(2),
        );

        assert!(ws.get_member("staff@example.com", "ana@example.com").await.is_ok());
        assert!(ws.get_member("staff@example.com", "bo@example.com").await.is_ok());
        assert!(ws.get_member("staff@example.com", "ana@example.com").await.is_err());
        assert!(ws.get_member("staff@example.com", "ana@example.com").await.is_err());
        assert!(ws.get_member("staff@example.com", "ana@example.com").await.is_ok());
        assert_eq!(ws.call_count(Operation::GetMember), 5);
    }

    #[tokio::test]
    async fn test_unscoped_fault_matches_any_subject() {
        let ws = workspace();
        ws.inject(Fault::new(Operation::GetMember, RemoteError::quota("Quota exceeded")).times(2));

        assert!(ws.get_member("staff@example.com", "ana@example.com").await.is_err());
        assert!(ws.get_member("staff@example.com", "bo@example.com").await.is_err());
        assert!(ws.get_member("staff@example.com", "ana@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_license_lifecycle() {
        let ws = InMemoryWorkspace::new();

        ws.insert_assignment("Google-Apps", "1010020027", "ana@example.com")
            .await
            .unwrap();
        let dup = ws
            .insert_assignment("Google-Apps", "1010020027", "ana@example.com")
            .await
            .unwrap_err();
        assert_eq!(dup.kind, ErrorKind::Duplicate);

        let moved = ws
            .update_assignment(
                "Google-Apps",
                "1010020027",
                "ana@example.com",
                &LicenseAssignment::new("Google-Apps", "1010020028", "ana@example.com"),
            )
            .await
            .unwrap();
        assert_eq!(moved.sku_id, "1010020028");

        ws.delete_assignment("Google-Apps", "1010020028", "ana@example.com")
            .await
            .unwrap();
        assert!(ws.licenses().is_empty());
    }

    #[tokio::test]
    async fn test_archive_rejects_duplicates() {
        let ws = workspace();
        ws.insert_message("ops@example.com", b"Subject: hi\r\n\r\nbody")
            .await
            .unwrap();
        let dup = ws
            .insert_message("ops@example.com", b"Subject: hi\r\n\r\nbody")
            .await
            .unwrap_err();
        assert_eq!(dup.kind, ErrorKind::Duplicate);
        assert_eq!(ws.archive("ops@example.com").len(), 1);
    }
}
