//! Stock ledger (append-only stock movements).
//!
//! This crate contains the ledger entry model only; stores persist it.

pub mod ledger;

pub use ledger::{MovementKind, StockMovement, StockMovementId, net_change};
