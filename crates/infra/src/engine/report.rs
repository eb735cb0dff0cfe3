//! Read views returned by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procure_catalog::{ProductId, SupplierId};
use procure_core::{AggregateId, Money};
use procure_invoicing::{Invoice, InvoiceId, InvoiceStatus};
use procure_purchasing::{DeliveryStatus, PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};

use super::EngineError;

/// One order line with its simulated delivery outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineReport {
    pub line_no: u32,
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub requested_unit_price: Money,
    pub unit_price: Money,
    pub simulated_quantity: i64,
    pub delivery_status: DeliveryStatus,
    pub message: String,
}

/// Order state returned by creation, simulation replay and queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReport {
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub ordered_at: DateTime<Utc>,
    pub status: PurchaseOrderStatus,
    pub expected_delay_days: u32,
    pub invoice_id: Option<AggregateId>,
    pub lines: Vec<OrderLineReport>,
}

impl PurchaseOrderReport {
    pub fn from_order(order: &PurchaseOrder) -> Result<Self, EngineError> {
        let missing = |what: &str| {
            EngineError::Storage(format!("purchase order {} has no {what}", order.id_typed()))
        };

        let simulation = order.simulation().ok_or_else(|| missing("delivery simulation"))?;
        let lines = order
            .lines()
            .iter()
            .zip(&simulation.outcomes)
            .map(|(line, outcome)| OrderLineReport {
                line_no: line.line_no,
                product_id: line.product_id,
                requested_quantity: line.requested_quantity,
                requested_unit_price: line.requested_unit_price,
                unit_price: line.unit_price,
                simulated_quantity: outcome.received_quantity,
                delivery_status: outcome.status,
                message: outcome.message(),
            })
            .collect();

        Ok(Self {
            order_id: order.id_typed(),
            supplier_id: order.supplier_id().ok_or_else(|| missing("supplier"))?,
            ordered_at: order.ordered_at().ok_or_else(|| missing("order date"))?,
            status: order.status(),
            expected_delay_days: simulation.delay_days,
            invoice_id: order.invoice_id(),
            lines,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineReport {
    pub line_no: u32,
    pub product_id: ProductId,
    pub requested_quantity: i64,
    pub received_quantity: i64,
    pub unit_price: Money,
    /// `received - requested`.
    pub variance: i64,
    pub subtotal: Money,
}

/// Invoice issued by a delivery confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceReport {
    pub invoice_id: InvoiceId,
    pub order_id: PurchaseOrderId,
    pub supplier_id: SupplierId,
    pub issued_at: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub total_amount: Money,
    pub lines: Vec<InvoiceLineReport>,
}

impl InvoiceReport {
    pub fn from_invoice(invoice: &Invoice) -> Result<Self, EngineError> {
        let missing = |what: &str| {
            EngineError::Storage(format!("invoice {} has no {what}", invoice.id_typed()))
        };

        let lines = invoice
            .lines()
            .iter()
            .map(|l| -> Result<InvoiceLineReport, EngineError> {
                Ok(InvoiceLineReport {
                    line_no: l.line_no,
                    product_id: l.product_id,
                    requested_quantity: l.requested_quantity,
                    received_quantity: l.received_quantity,
                    unit_price: l.unit_price,
                    variance: l.variance(),
                    subtotal: l.subtotal()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            invoice_id: invoice.id_typed(),
            order_id: invoice.purchase_order_id().ok_or_else(|| missing("purchase order"))?,
            supplier_id: invoice.supplier_id().ok_or_else(|| missing("supplier"))?,
            issued_at: invoice.issued_at().ok_or_else(|| missing("issue date"))?,
            status: invoice.status(),
            total_amount: invoice.total_amount(),
            lines,
        })
    }
}
