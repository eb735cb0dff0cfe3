//! Purchase order engine (application-level orchestration).
//!
//! Each operation is one unit of work against the store:
//!
//! ```text
//! request
//!   ↓
//! 1. Load catalog records / the order snapshot
//!   ↓
//! 2. Draw prices and the delivery simulation from the injected RandomSource
//!   ↓
//! 3. Run the command through the PurchaseOrder aggregate (pure decision)
//!   ↓
//! 4. Persist the new snapshot (plus stock, ledger and invoice on confirmation)
//!    with an optimistic version check
//! ```
//!
//! The engine holds no state besides the store handle and the random source.

mod error;
mod report;

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use procure_catalog::{ProductId, SupplierId};
use procure_core::{Aggregate, AggregateRoot, Event, ExpectedVersion, Money};
use procure_inventory::StockMovement;
use procure_invoicing::{Invoice, InvoiceId};
use procure_purchasing::{
    Cancel, ConfirmDelivery, DeliveryConfirmed, DeliverySimulator, PlaceOrder, PricedLine,
    PricingPolicy, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId,
    RandomSource, ReceivedLine, RecordSimulation,
};

use crate::store::{CatalogStore, DeliveryCommit, PurchasingStore};

pub use error::EngineError;
pub use report::{InvoiceLineReport, InvoiceReport, OrderLineReport, PurchaseOrderReport};

/// One requested line of a new purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub requested_unit_price: Money,
}

/// Orchestrates purchase order creation, simulation replay and delivery
/// confirmation over a store.
pub struct PurchaseOrderEngine<S> {
    store: S,
    rng: Mutex<Box<dyn RandomSource>>,
    pricing: PricingPolicy,
    simulator: DeliverySimulator,
}

impl<S> PurchaseOrderEngine<S> {
    pub fn new(store: S, rng: impl RandomSource + 'static) -> Self {
        Self {
            store,
            rng: Mutex::new(Box::new(rng)),
            pricing: PricingPolicy::default(),
            simulator: DeliverySimulator::default(),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_simulator(mut self, simulator: DeliverySimulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lock_rng(&self) -> Result<MutexGuard<'_, Box<dyn RandomSource>>, EngineError> {
        self.rng
            .lock()
            .map_err(|_| EngineError::Storage("random source lock poisoned".to_string()))
    }
}

fn log_events(events: &[PurchaseOrderEvent], order_id: PurchaseOrderId) {
    for event in events {
        info!(
            order_id = %order_id,
            event_type = event.event_type(),
            occurred_at = %event.occurred_at(),
            "purchase order event"
        );
    }
}

impl<S> PurchaseOrderEngine<S>
where
    S: CatalogStore + PurchasingStore,
{
    /// Place a purchase order with a supplier and simulate its delivery.
    #[instrument(
        skip(self, lines),
        fields(supplier_id = %supplier_id, line_count = lines.len()),
        err
    )]
    pub async fn create_purchase_order(
        &self,
        supplier_id: SupplierId,
        lines: Vec<NewOrderLine>,
    ) -> Result<PurchaseOrderReport, EngineError> {
        if lines.is_empty() {
            return Err(EngineError::InvalidInput(
                "purchase order must have at least one line".to_string(),
            ));
        }

        let supplier = self
            .store
            .supplier(supplier_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("supplier {supplier_id}")))?;
        if !supplier.is_active() {
            return Err(EngineError::InvalidInput(format!(
                "supplier {supplier_id} is inactive"
            )));
        }

        for line in &lines {
            let product = self
                .store
                .product(line.product_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("product {}", line.product_id)))?;
            if !product.is_active() {
                return Err(EngineError::InvalidInput(format!(
                    "product {} is inactive",
                    line.product_id
                )));
            }
        }

        let order_id = PurchaseOrderId::generate();
        let mut order = PurchaseOrder::empty(order_id);
        let events = {
            let mut guard = self.lock_rng()?;
            let rng: &mut dyn RandomSource = &mut **guard;

            let priced = lines
                .iter()
                .map(|l| -> Result<PricedLine, EngineError> {
                    Ok(PricedLine {
                        product_id: l.product_id,
                        requested_quantity: l.requested_quantity,
                        requested_unit_price: l.requested_unit_price,
                        unit_price: self.pricing.finalize_price(l.requested_unit_price, rng)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut events = order.execute(&PurchaseOrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                supplier_id,
                lines: priced,
                occurred_at: Utc::now(),
            }))?;

            let simulation = self.simulator.simulate(&order.simulation_input(), rng);
            events.extend(order.execute(&PurchaseOrderCommand::RecordSimulation(
                RecordSimulation {
                    order_id,
                    simulation,
                    occurred_at: Utc::now(),
                },
            ))?);
            events
        };

        let snapshot = order
            .snapshot()
            .ok_or_else(|| EngineError::Storage("placed order has no snapshot".to_string()))?;
        self.store.insert_order(&snapshot).await?;
        log_events(&events, order_id);

        PurchaseOrderReport::from_order(&order)
    }

    /// Replay the stored supplier response for an order. Never re-randomizes.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn simulate_provider_response(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrderReport, EngineError> {
        let order = self.load_order(order_id).await?;
        PurchaseOrderReport::from_order(&order)
    }

    /// Confirm what actually arrived: increments stock, appends INCOME ledger
    /// entries, issues the invoice and completes the order in one commit.
    #[instrument(
        skip(self, confirmations),
        fields(order_id = %order_id, line_count = confirmations.len()),
        err
    )]
    pub async fn confirm_delivery(
        &self,
        order_id: PurchaseOrderId,
        confirmations: Vec<ReceivedLine>,
    ) -> Result<InvoiceReport, EngineError> {
        let mut order = self.load_order(order_id).await?;
        let expected_version = ExpectedVersion::Exact(order.version());
        let invoice_id = InvoiceId::generate();

        let events = order.execute(&PurchaseOrderCommand::ConfirmDelivery(ConfirmDelivery {
            order_id,
            invoice_id: invoice_id.0,
            lines: confirmations,
            occurred_at: Utc::now(),
        }))?;

        let confirmed: &DeliveryConfirmed = events
            .iter()
            .find_map(|e| match e {
                PurchaseOrderEvent::DeliveryConfirmed(c) => Some(c),
                _ => None,
            })
            .ok_or_else(|| EngineError::Storage("confirmation produced no event".to_string()))?;

        let invoice = Invoice::from_confirmation(confirmed)?;

        let mut stock_increments = Vec::with_capacity(confirmed.lines.len());
        let mut movements = Vec::with_capacity(confirmed.lines.len());
        for line in &confirmed.lines {
            stock_increments.push((line.product_id, line.received_quantity));
            movements.push(StockMovement::income(
                line.product_id,
                line.received_quantity,
                Some(order_id.0),
                confirmed.occurred_at,
            )?);
        }

        let commit = DeliveryCommit {
            order: order
                .snapshot()
                .ok_or_else(|| EngineError::Storage("confirmed order has no snapshot".to_string()))?,
            expected_version,
            stock_increments,
            movements,
            invoice: invoice
                .snapshot()
                .ok_or_else(|| EngineError::Storage("issued invoice has no snapshot".to_string()))?,
        };
        self.store.commit_delivery(commit).await?;

        log_events(&events, order_id);
        info!(
            order_id = %order_id,
            invoice_id = %invoice.id_typed(),
            total_amount = %invoice.total_amount(),
            "invoice issued"
        );

        InvoiceReport::from_invoice(&invoice)
    }

    /// Cancel a pending order. No stock effect.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn cancel_purchase_order(
        &self,
        order_id: PurchaseOrderId,
        reason: Option<String>,
    ) -> Result<PurchaseOrderReport, EngineError> {
        let mut order = self.load_order(order_id).await?;
        let expected_version = ExpectedVersion::Exact(order.version());

        let events = order.execute(&PurchaseOrderCommand::Cancel(Cancel {
            order_id,
            reason,
            occurred_at: Utc::now(),
        }))?;

        let snapshot = order
            .snapshot()
            .ok_or_else(|| EngineError::Storage("cancelled order has no snapshot".to_string()))?;
        self.store.save_order(&snapshot, expected_version).await?;
        log_events(&events, order_id);

        PurchaseOrderReport::from_order(&order)
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn get_purchase_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrderReport, EngineError> {
        let order = self.load_order(order_id).await?;
        PurchaseOrderReport::from_order(&order)
    }

    #[instrument(skip(self), err)]
    pub async fn list_purchase_orders(&self) -> Result<Vec<PurchaseOrderReport>, EngineError> {
        self.store
            .list_orders()
            .await?
            .into_iter()
            .map(|snapshot| PurchaseOrderReport::from_order(&PurchaseOrder::restore(snapshot)))
            .collect()
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn invoice_for_order(
        &self,
        order_id: PurchaseOrderId,
    ) -> Result<InvoiceReport, EngineError> {
        // Distinguish a missing order from an order without an invoice.
        self.load_order(order_id).await?;
        let snapshot = self
            .store
            .invoice_for_order(order_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("invoice for purchase order {order_id}"))
            })?;
        InvoiceReport::from_invoice(&Invoice::restore(snapshot))
    }

    async fn load_order(&self, order_id: PurchaseOrderId) -> Result<PurchaseOrder, EngineError> {
        self.store
            .order(order_id)
            .await?
            .map(PurchaseOrder::restore)
            .ok_or_else(|| EngineError::NotFound(format!("purchase order {order_id}")))
    }
}

#[cfg(test)]
mod tests;
