use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use procure_catalog::{Product, ProductId, Supplier, SupplierId};
use procure_core::ExpectedVersion;
use procure_inventory::StockMovement;
use procure_invoicing::InvoiceSnapshot;
use procure_purchasing::{PurchaseOrderId, PurchaseOrderSnapshot};

use super::{CatalogStore, DeliveryCommit, PurchasingStore, StoreError};

#[derive(Debug, Default)]
struct State {
    suppliers: HashMap<SupplierId, Supplier>,
    products: HashMap<ProductId, Product>,
    movements: Vec<StockMovement>,
    // UUIDv7 keys, so iteration order is creation order.
    orders: BTreeMap<PurchaseOrderId, PurchaseOrderSnapshot>,
    invoices: HashMap<PurchaseOrderId, InvoiceSnapshot>,
}

/// In-memory catalog + purchasing store.
///
/// Intended for tests/dev. A single mutex guards all state, which makes every
/// write (including [`DeliveryCommit`]) trivially atomic and serializes stock
/// increments across orders.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    /// Seed or replace a supplier.
    pub fn insert_supplier(&self, supplier: Supplier) -> Result<(), StoreError> {
        self.lock()?.suppliers.insert(supplier.id, supplier);
        Ok(())
    }

    /// Seed or replace a product.
    pub fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        self.lock()?.products.insert(product.id, product);
        Ok(())
    }
}

fn check_version(
    order_id: PurchaseOrderId,
    stored: &PurchaseOrderSnapshot,
    expected: ExpectedVersion,
) -> Result<(), StoreError> {
    if expected.matches(stored.version) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "purchase order {order_id}: expected {expected:?}, found {}",
            stored.version
        )))
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        Ok(self.lock()?.suppliers.get(&id).cloned())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.lock()?.products.get(&id).cloned())
    }

    async fn stock_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        Ok(self
            .lock()?
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PurchasingStore for InMemoryStore {
    async fn insert_order(&self, order: &PurchaseOrderSnapshot) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::Concurrency(format!(
                "purchase order {} already exists",
                order.id
            )));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&self, id: PurchaseOrderId) -> Result<Option<PurchaseOrderSnapshot>, StoreError> {
        Ok(self.lock()?.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<PurchaseOrderSnapshot>, StoreError> {
        Ok(self.lock()?.orders.values().cloned().collect())
    }

    async fn save_order(
        &self,
        order: &PurchaseOrderSnapshot,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let stored = state
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::NotFound(format!("purchase order {}", order.id)))?;
        check_version(order.id, stored, expected_version)?;
        *stored = order.clone();
        Ok(())
    }

    async fn invoice_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<Option<InvoiceSnapshot>, StoreError> {
        Ok(self.lock()?.invoices.get(&order_id).cloned())
    }

    async fn commit_delivery(&self, commit: DeliveryCommit) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let order_id = commit.order.id;

        let stored = state
            .orders
            .get(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("purchase order {order_id}")))?;
        check_version(order_id, stored, commit.expected_version)?;
        if state.invoices.contains_key(&order_id) {
            return Err(StoreError::Concurrency(format!(
                "purchase order {order_id} is already invoiced"
            )));
        }

        // Stage every stock change before touching state.
        let mut staged: HashMap<ProductId, Product> = HashMap::new();
        for (product_id, delta) in &commit.stock_increments {
            if !staged.contains_key(product_id) {
                let product = state
                    .products
                    .get(product_id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
                staged.insert(*product_id, product);
            }
            if let Some(product) = staged.get_mut(product_id) {
                product
                    .increment_stock(*delta)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }

        state.products.extend(staged);
        state.movements.extend(commit.movements);
        state.invoices.insert(order_id, commit.invoice);
        state.orders.insert(order_id, commit.order);
        Ok(())
    }
}
