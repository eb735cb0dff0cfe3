use axum::Router;

pub mod purchase_orders;
pub mod system;

/// Router for all business endpoints.
pub fn router() -> Router {
    Router::new().nest("/purchase-orders", purchase_orders::router())
}
