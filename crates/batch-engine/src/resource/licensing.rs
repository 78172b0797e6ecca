//! Licensing client: product license assignments for one customer

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::catalog::{Product, ProductCatalog};
use super::model::LicenseAssignment;
use super::service::{LicenseService, ResourceError};
use crate::batch::{
    fan_out, fan_out_keyed, BatchConfig, BatchExecutor, BatchReport, FanOutResult, KeyedFanOut,
    Outcome, WorkItem,
};
use crate::config::EngineConfig;
use crate::pagination::{ListingResult, Paginator, PaginatorConfig};
use crate::reliability::{ErrorPolicy, NotFoundPolicy};

const LICENSE_PAGE_SIZE: u32 = 1000;

/// License operations scoped to one customer
///
/// Cloning is cheap; clones share the service, catalog and cancellation.
///
/// # Example
///
/// ```ignore
/// let catalog = Arc::new(ProductCatalog::google_workspace());
/// let licensing = Licensing::new(service, directory.customer_id(), catalog, &config)?;
///
/// let all = licensing.licenses(licensing.catalog().all().to_vec()).await;
/// for failure in &all.failures {
///     eprintln!("{}: {}", failure.query, failure.error);
/// }
/// ```
pub struct Licensing<S> {
    service: Arc<S>,
    customer_id: String,
    catalog: Arc<ProductCatalog>,
    batch: BatchConfig,
    pagination: PaginatorConfig,
    cancel: CancellationToken,
}

impl<S> Clone for Licensing<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            customer_id: self.customer_id.clone(),
            catalog: Arc::clone(&self.catalog),
            batch: self.batch.clone(),
            pagination: self.pagination.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: LicenseService> Licensing<S> {
    pub fn new(
        service: Arc<S>,
        customer_id: impl Into<String>,
        catalog: Arc<ProductCatalog>,
        config: &EngineConfig,
    ) -> Result<Self, ResourceError> {
        config.validate()?;
        let mut pagination = config.pagination.clone();
        pagination.page_size.get_or_insert(LICENSE_PAGE_SIZE);

        Ok(Self {
            service,
            customer_id: customer_id.into(),
            catalog,
            batch: config.batch.clone(),
            pagination,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    fn paginator(&self) -> Paginator {
        Paginator::new(self.pagination.clone()).with_cancellation(self.cancel.clone())
    }

    fn executor(&self, width: usize) -> BatchExecutor {
        BatchExecutor::new(self.batch.clone().with_concurrency(width))
            .with_cancellation(self.cancel.clone())
    }

    /// Every assignment of every SKU in `products`, as one flat listing
    ///
    /// One listing per SKU runs concurrently.
    #[instrument(skip_all, fields(products = products.len()))]
    pub async fn licenses(&self, products: Vec<Product>) -> FanOutResult<Product, LicenseAssignment> {
        let this = self.clone();
        let result = fan_out(products, move |product| {
            let this = this.clone();
            async move { this.list_for_product_and_sku(&product).await }
        })
        .await;
        info!(
            licenses = result.items.len(),
            failed_queries = result.failures.len(),
            "License fan-out complete"
        );
        result
    }

    /// Assignments of every SKU in `products`, kept per SKU
    #[instrument(skip_all, fields(products = products.len()))]
    pub async fn licenses_by_product(
        &self,
        products: Vec<Product>,
    ) -> KeyedFanOut<Product, LicenseAssignment> {
        let this = self.clone();
        fan_out_keyed(products, move |product| {
            let this = this.clone();
            async move { this.list_for_product_and_sku(&product).await }
        })
        .await
    }

    /// Every assignment of any SKU of `product_id`
    pub async fn list_for_product(&self, product_id: &str) -> ListingResult<LicenseAssignment> {
        info!(product_id = %product_id, "Querying licenses");
        let service = self.service.as_ref();
        let customer = self.customer_id.as_str();
        self.paginator()
            .collect(product_id, move |page| {
                service.list_for_product(product_id, customer, page)
            })
            .await
    }

    /// Every assignment of one SKU
    pub async fn list_for_product_and_sku(
        &self,
        product: &Product,
    ) -> ListingResult<LicenseAssignment> {
        info!(sku = %product.sku_name, "Querying licenses");
        let service = self.service.as_ref();
        let customer = self.customer_id.as_str();
        self.paginator()
            .collect(&product.sku_name, move |page| {
                service.list_for_product_and_sku(&product.product_id, &product.sku_id, customer, page)
            })
            .await
    }

    pub async fn get(&self, product: &Product, user_id: &str) -> Outcome<LicenseAssignment> {
        let service = self.service.as_ref();
        self.executor(1)
            .execute_one(
                WorkItem::new(user_id, &product.sku_id),
                &ErrorPolicy::query(),
                |item: WorkItem| async move {
                    service
                        .get_assignment(&product.product_id, &product.sku_id, &item.id)
                        .await
                },
            )
            .await
            .outcome
    }

    /// Assign `product` to one user; an existing assignment is skipped
    pub async fn assign(&self, product: &Product, user_id: &str) -> Outcome<LicenseAssignment> {
        let service = self.service.as_ref();
        self.executor(1)
            .execute_one(
                WorkItem::new(user_id, &product.sku_id),
                &ErrorPolicy::insert(),
                |item: WorkItem| async move {
                    service
                        .insert_assignment(&product.product_id, &product.sku_id, &item.id)
                        .await
                },
            )
            .await
            .outcome
    }

    /// Remove `product` from one user; a missing assignment is skipped
    pub async fn revoke(&self, product: &Product, user_id: &str) -> Outcome<()> {
        let service = self.service.as_ref();
        self.executor(1)
            .execute_one(
                WorkItem::new(user_id, &product.sku_id),
                &ErrorPolicy::delete(NotFoundPolicy::Skip),
                |item: WorkItem| async move {
                    service
                        .delete_assignment(&product.product_id, &product.sku_id, &item.id)
                        .await
                },
            )
            .await
            .outcome
    }

    /// Move one user from the `from` SKU to the `to` SKU
    pub async fn reassign(
        &self,
        from: &Product,
        to: &Product,
        user_id: &str,
    ) -> Outcome<LicenseAssignment> {
        let service = self.service.as_ref();
        let mut target = LicenseAssignment::new(&to.product_id, &to.sku_id, user_id);
        target.sku_name = Some(to.sku_name.clone());

        self.executor(1)
            .execute_one(
                WorkItem::with_payload(user_id, &to.sku_id, target),
                &ErrorPolicy::update(),
                |item: WorkItem<LicenseAssignment>| async move {
                    service
                        .update_assignment(&from.product_id, &from.sku_id, &item.id, &item.payload)
                        .await
                },
            )
            .await
            .outcome
    }

    /// Assign `product` to many users in waves of `width`
    #[instrument(skip(self, user_ids), fields(sku = %product.sku_id, total = user_ids.len()))]
    pub async fn assign_many(
        &self,
        product: &Product,
        user_ids: Vec<String>,
        width: usize,
    ) -> BatchReport<(), LicenseAssignment> {
        let items = user_ids
            .into_iter()
            .map(|user| WorkItem::new(user, &product.sku_id))
            .collect();

        let service = Arc::clone(&self.service);
        let product_id = product.product_id.clone();
        self.executor(width)
            .execute(items, ErrorPolicy::insert(), move |item: WorkItem| {
                let service = Arc::clone(&service);
                let product_id = product_id.clone();
                async move {
                    service
                        .insert_assignment(&product_id, &item.target, &item.id)
                        .await
                }
            })
            .await
    }

    /// Remove `product` from many users in waves of `width`
    #[instrument(skip(self, user_ids), fields(sku = %product.sku_id, total = user_ids.len()))]
    pub async fn revoke_many(
        &self,
        product: &Product,
        user_ids: Vec<String>,
        width: usize,
    ) -> BatchReport<(), ()> {
        let items = user_ids
            .into_iter()
            .map(|user| WorkItem::new(user, &product.sku_id))
            .collect();

        let service = Arc::clone(&self.service);
        let product_id = product.product_id.clone();
        self.executor(width)
            .execute(
                items,
                ErrorPolicy::delete(NotFoundPolicy::Skip),
                move |item: WorkItem| {
                    let service = Arc::clone(&service);
                    let product_id = product_id.clone();
                    async move {
                        service
                            .delete_assignment(&product_id, &item.target, &item.id)
                            .await
                    }
                },
            )
            .await
    }
}
