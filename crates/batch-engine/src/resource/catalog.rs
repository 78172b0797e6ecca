//! Product SKU catalog
//!
//! An immutable table of licensable products. Clients share one catalog
//! through an `Arc`; nothing in the crate keeps a global copy.

use serde::{Deserialize, Serialize};

/// One licensable product SKU
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub product_name: String,
    pub sku_id: String,
    pub sku_name: String,
    /// Product to move an archived user back to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unarchival_product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unarchival_sku_id: Option<String>,
}

impl Product {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        sku_id: impl Into<String>,
        sku_name: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            sku_id: sku_id.into(),
            sku_name: sku_name.into(),
            unarchival_product_id: None,
            unarchival_sku_id: None,
        }
    }

    pub fn with_unarchival(
        mut self,
        product_id: impl Into<String>,
        sku_id: impl Into<String>,
    ) -> Self {
        self.unarchival_product_id = Some(product_id.into());
        self.unarchival_sku_id = Some(sku_id.into());
        self
    }

    /// True for archived-user SKUs
    pub fn is_archival(&self) -> bool {
        self.unarchival_sku_id.is_some()
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}/{})", self.sku_name, self.product_id, self.sku_id)
    }
}

/// Lookup table of products
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

const WORKSPACE: &str = "Google-Apps";
const WORKSPACE_NAME: &str = "Google Workspace";
const VAULT: &str = "Google-Vault";
const ARCHIVED: &str = "101034";
const ARCHIVED_NAME: &str = "Google Workspace Archived User";

impl ProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Google Workspace, Vault and archived-user SKUs
    pub fn google_workspace() -> Self {
        let workspace = |sku: &str, name: &str| Product::new(WORKSPACE, WORKSPACE_NAME, sku, name);
        let archived = |sku: &str, name: &str, restore: &str| {
            Product::new(ARCHIVED, ARCHIVED_NAME, sku, name).with_unarchival(WORKSPACE, restore)
        };

        Self::new(vec![
            workspace("1010020027", "Google Workspace Business Starter"),
            workspace("1010020028", "Google Workspace Business Standard"),
            workspace("1010020025", "Google Workspace Business Plus"),
            workspace("1010060003", "Google Workspace Enterprise Essentials"),
            workspace("1010020026", "Google Workspace Enterprise Standard"),
            workspace(
                "1010020020",
                "Google Workspace Enterprise Plus (formerly G Suite Enterprise)",
            ),
            workspace(
                "1010060001",
                "Google Workspace Essentials (formerly G Suite Essentials)",
            ),
            workspace("1010020030", "Google Workspace Frontline"),
            Product::new(VAULT, "Google Vault", "Google-Vault", "Google Vault"),
            Product::new(
                VAULT,
                "Google Vault",
                "Google-Vault-Former-Employee",
                "Google Vault - Former Employee",
            ),
            archived(
                "1010340001",
                "Google Workspace Enterprise Plus - Archived User",
                "1010020020",
            ),
            archived(
                "1010340002",
                "G Suite Business - Archived User",
                "Google-Apps-Unlimited",
            ),
            archived(
                "1010340003",
                "Google Workspace Business Plus - Archived User",
                "1010020025",
            ),
            archived(
                "1010340004",
                "Google Workspace Enterprise Standard - Archived User",
                "1010020026",
            ),
        ])
    }

    pub fn all(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn by_sku_id(&self, sku_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.sku_id == sku_id)
    }

    pub fn by_sku_name(&self, sku_name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.sku_name == sku_name)
    }

    /// Every SKU of one product
    pub fn products_for(&self, product_id: &str) -> Vec<Product> {
        self.products
            .iter()
            .filter(|p| p.product_id == product_id)
            .cloned()
            .collect()
    }

    /// The active SKU an archived user is restored to, if it is cataloged
    pub fn unarchival_target(&self, product: &Product) -> Option<&Product> {
        let product_id = product.unarchival_product_id.as_deref()?;
        let sku_id = product.unarchival_sku_id.as_deref()?;
        self.products
            .iter()
            .find(|p| p.product_id == product_id && p.sku_id == sku_id)
    }
}
