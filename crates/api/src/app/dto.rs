use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use procure_catalog::ProductId;
use procure_infra::{InvoiceReport, NewOrderLine, PurchaseOrderReport};
use procure_purchasing::ReceivedLine;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateOrderLineRequest {
    pub product_id: String,
    pub requested_quantity: i64,
    pub purchase_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmLineRequest {
    pub product_id: String,
    pub received_quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid product id '{raw}'"))
    })
}

pub fn to_new_order_lines(
    body: Vec<CreateOrderLineRequest>,
) -> Result<Vec<NewOrderLine>, axum::response::Response> {
    body.into_iter()
        .map(|l| -> Result<NewOrderLine, axum::response::Response> {
            Ok(NewOrderLine {
                product_id: parse_product_id(&l.product_id)?,
                requested_quantity: l.requested_quantity,
                requested_unit_price: l.purchase_price,
            })
        })
        .collect()
}

pub fn to_received_lines(
    body: Vec<ConfirmLineRequest>,
) -> Result<Vec<ReceivedLine>, axum::response::Response> {
    body.into_iter()
        .map(|l| -> Result<ReceivedLine, axum::response::Response> {
            Ok(ReceivedLine {
                product_id: parse_product_id(&l.product_id)?,
                received_quantity: l.received_quantity,
            })
        })
        .collect()
}

// -------------------------
// Response mapping
// -------------------------

pub fn purchase_order_to_json(report: PurchaseOrderReport) -> Value {
    json!({
        "id": report.order_id.to_string(),
        "supplier_id": report.supplier_id.to_string(),
        "order_date": report.ordered_at.to_rfc3339(),
        "status": report.status.as_str(),
        "expected_delay_days": report.expected_delay_days,
        "invoice_id": report.invoice_id.map(|id| id.to_string()),
        "lines": report.lines.into_iter().map(|l| json!({
            "line_no": l.line_no,
            "product_id": l.product_id.to_string(),
            "requested_quantity": l.requested_quantity,
            "purchase_price": l.requested_unit_price.to_string(),
            "unit_price": l.unit_price.to_string(),
            "simulated_quantity": l.simulated_quantity,
            "delivery_status": l.delivery_status.as_str(),
            "message": l.message,
        })).collect::<Vec<_>>()
    })
}

pub fn invoice_to_json(report: InvoiceReport) -> Value {
    json!({
        "id": report.invoice_id.to_string(),
        "purchase_order_id": report.order_id.to_string(),
        "supplier_id": report.supplier_id.to_string(),
        "issue_date": report.issued_at.to_rfc3339(),
        "status": report.status.as_str(),
        "total_amount": report.total_amount.to_string(),
        "lines": report.lines.into_iter().map(|l| json!({
            "line_no": l.line_no,
            "product_id": l.product_id.to_string(),
            "requested_quantity": l.requested_quantity,
            "received_quantity": l.received_quantity,
            "variance": l.variance,
            "unit_price": l.unit_price.to_string(),
            "subtotal": l.subtotal.to_string(),
        })).collect::<Vec<_>>()
    })
}
