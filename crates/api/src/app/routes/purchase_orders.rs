use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use procure_catalog::SupplierId;
use procure_purchasing::PurchaseOrderId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_purchase_orders))
        // POST takes the supplier id, GET the order id.
        .route("/:id", post(create_purchase_order).get(get_purchase_order))
        .route("/:id/simulate", get(simulate_provider_response))
        .route("/:id/confirm", post(confirm_delivery))
        .route("/:id/cancel", post(cancel_purchase_order))
        .route("/:id/invoice", get(get_invoice))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(supplier_id): Path<String>,
    body: Result<Json<Vec<dto::CreateOrderLineRequest>>, JsonRejection>,
) -> axum::response::Response {
    let supplier_id: SupplierId = match errors::parse_path_id(&supplier_id, "supplier id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let lines = match dto::to_new_order_lines(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.create_purchase_order(supplier_id, lines).await {
        Ok(report) => (StatusCode::CREATED, Json(dto::purchase_order_to_json(report))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn simulate_provider_response(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match errors::parse_path_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.simulate_provider_response(order_id).await {
        Ok(report) => (StatusCode::OK, Json(dto::purchase_order_to_json(report))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn confirm_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<Vec<dto::ConfirmLineRequest>>, JsonRejection>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match errors::parse_path_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let lines = match dto::to_received_lines(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.confirm_delivery(order_id, lines).await {
        Ok(invoice) => (StatusCode::CREATED, Json(dto::invoice_to_json(invoice))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

/// The body is optional: an empty request cancels without a reason.
pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match errors::parse_path_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let request = if body.is_empty() {
        dto::CancelOrderRequest::default()
    } else {
        match serde_json::from_slice::<dto::CancelOrderRequest>(&body) {
            Ok(v) => v,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string());
            }
        }
    };

    match services.engine.cancel_purchase_order(order_id, request.reason).await {
        Ok(report) => (StatusCode::OK, Json(dto::purchase_order_to_json(report))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match errors::parse_path_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.get_purchase_order(order_id).await {
        Ok(report) => (StatusCode::OK, Json(dto::purchase_order_to_json(report))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_purchase_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.engine.list_purchase_orders().await {
        Ok(reports) => {
            let items = reports
                .into_iter()
                .map(dto::purchase_order_to_json)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match errors::parse_path_id(&id, "purchase order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.invoice_for_order(order_id).await {
        Ok(invoice) => (StatusCode::OK, Json(dto::invoice_to_json(invoice))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
