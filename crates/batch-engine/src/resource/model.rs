//! Resource records exchanged with the remote services

use serde::{Deserialize, Serialize};

/// Directory user account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub primary_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, primary_email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            primary_email: primary_email.into(),
            ..Default::default()
        }
    }

    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}

/// Directory group
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_members_count: Option<i64>,
}

impl Group {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            direct_members_count: None,
        }
    }
}

/// Role of a member within a group
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Owner,
    Manager,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "OWNER",
            MemberRole::Manager => "MANAGER",
            MemberRole::Member => "MEMBER",
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership of one address in a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub role: MemberRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Member {
    pub fn new(email: impl Into<String>, role: MemberRole) -> Self {
        Self {
            id: None,
            email: email.into(),
            role,
            status: None,
        }
    }
}

/// A license held by one user for one product SKU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseAssignment {
    pub product_id: String,
    pub sku_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_name: Option<String>,
    pub user_id: String,
}

impl LicenseAssignment {
    pub fn new(
        product_id: impl Into<String>,
        sku_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            sku_id: sku_id.into(),
            sku_name: None,
            user_id: user_id.into(),
        }
    }
}

/// Response to a group archive import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub response_code: String,
}

impl ImportResult {
    pub fn success() -> Self {
        Self {
            response_code: "SUCCESS".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_wire_format() {
        let member = Member::new("ana@example.com", MemberRole::Owner);
        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json["email"], "ana@example.com");
        assert_eq!(json["role"], "OWNER");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_user_deserializes_camel_case() {
        let user: User = serde_json::from_str(
            r#"{"id":"42","primaryEmail":"admin@example.com","customerId":"C01abc"}"#,
        )
        .unwrap();
        assert_eq!(user.primary_email, "admin@example.com");
        assert_eq!(user.customer_id.as_deref(), Some("C01abc"));
        assert!(!user.suspended);
    }

    #[test]
    fn test_license_assignment_wire_format() {
        let json = serde_json::to_value(LicenseAssignment::new(
            "Google-Apps",
            "1010020027",
            "ana@example.com",
        ))
        .unwrap();
        assert_eq!(json["productId"], "Google-Apps");
        assert_eq!(json["skuId"], "1010020027");
        assert_eq!(json["userId"], "ana@example.com");
    }
}
