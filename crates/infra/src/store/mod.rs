//! Storage boundary for the purchasing engine.
//!
//! Two ports cover what the engine reads and writes:
//!
//! - [`CatalogStore`]: suppliers, products and the stock ledger (read side).
//! - [`PurchasingStore`]: purchase orders, invoices and the delivery unit of
//!   work ([`DeliveryCommit`]).
//!
//! Stores persist aggregate snapshots and check an [`ExpectedVersion`] on every
//! write to an existing order, so stale writers fail with
//! [`StoreError::Concurrency`] instead of overwriting each other.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use procure_catalog::{Product, ProductId, Supplier, SupplierId};
use procure_core::ExpectedVersion;
use procure_inventory::StockMovement;
use procure_invoicing::InvoiceSnapshot;
use procure_purchasing::{PurchaseOrderId, PurchaseOrderSnapshot};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Store operation error.
///
/// Infrastructure failures only; business rule failures never reach a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Everything a delivery confirmation writes, committed all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryCommit {
    /// Order state after confirmation (status COMPLETED, invoice linked).
    pub order: PurchaseOrderSnapshot,
    /// Version the stored order must still be at.
    pub expected_version: ExpectedVersion,
    /// `(product, delta)` pairs added to product stock.
    pub stock_increments: Vec<(ProductId, i64)>,
    /// Ledger entries appended alongside the increments.
    pub movements: Vec<StockMovement>,
    pub invoice: InvoiceSnapshot,
}

/// Read access to catalog records and the stock ledger.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError>;

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Ledger entries for a product in insertion order.
    async fn stock_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError>;
}

/// Purchase order and invoice persistence.
#[async_trait]
pub trait PurchasingStore: Send + Sync {
    /// Insert a newly placed order. Fails with `Concurrency` if the id exists.
    async fn insert_order(&self, order: &PurchaseOrderSnapshot) -> Result<(), StoreError>;

    async fn order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrderSnapshot>, StoreError>;

    /// All orders, oldest first.
    async fn list_orders(&self) -> Result<Vec<PurchaseOrderSnapshot>, StoreError>;

    /// Overwrite an existing order if it is still at `expected_version`.
    async fn save_order(
        &self,
        order: &PurchaseOrderSnapshot,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError>;

    async fn invoice_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError>;

    /// Apply a delivery confirmation atomically.
    ///
    /// Implementations must either persist every part of `commit` (order
    /// update, stock increments, ledger entries, invoice) or none of it.
    async fn commit_delivery(&self, commit: DeliveryCommit) -> Result<(), StoreError>;
}

/// Combined store used by the engine when erased behind a trait object.
pub trait ProcurementStore: CatalogStore + PurchasingStore {}

impl<T> ProcurementStore for T where T: CatalogStore + PurchasingStore {}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        (**self).supplier(id).await
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id).await
    }

    async fn stock_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        (**self).stock_movements(product_id).await
    }
}

#[async_trait]
impl<S> PurchasingStore for Arc<S>
where
    S: PurchasingStore + ?Sized,
{
    async fn insert_order(&self, order: &PurchaseOrderSnapshot) -> Result<(), StoreError> {
        (**self).insert_order(order).await
    }

    async fn order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrderSnapshot>, StoreError> {
        (**self).order(id).await
    }

    async fn list_orders(&self) -> Result<Vec<PurchaseOrderSnapshot>, StoreError> {
        (**self).list_orders().await
    }

    async fn save_order(
        &self,
        order: &PurchaseOrderSnapshot,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).save_order(order, expected_version).await
    }

    async fn invoice_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError> {
        (**self).invoice_for_order(order_id).await
    }

    async fn commit_delivery(&self, commit: DeliveryCommit) -> Result<(), StoreError> {
        (**self).commit_delivery(commit).await
    }
}

/// Shared, type-erased store handle.
pub type DynStore = Arc<dyn ProcurementStore>;
