use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procure_catalog::ProductId;
use procure_core::{AggregateId, DomainError, DomainResult, typed_id};

typed_id!(
    /// Stock ledger entry identifier.
    StockMovementId
);

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementKind {
    Income,
    Expense,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Income => "INCOME",
            MovementKind::Expense => "EXPENSE",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "INCOME" => Ok(MovementKind::Income),
            "EXPENSE" => Ok(MovementKind::Expense),
            other => Err(DomainError::validation(format!("unknown movement kind '{other}'"))),
        }
    }
}

/// One append-only stock ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: StockMovementId,
    pub product_id: ProductId,
    /// Always positive; the direction is carried by `kind`.
    pub quantity: i64,
    pub kind: MovementKind,
    /// Originating document (e.g. the purchase order), if any.
    pub reference: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn new(
        product_id: ProductId,
        quantity: i64,
        kind: MovementKind,
        reference: Option<AggregateId>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("movement quantity must be positive"));
        }
        Ok(Self {
            id: StockMovementId::generate(),
            product_id,
            quantity,
            kind,
            reference,
            occurred_at,
        })
    }

    /// Stock received into the warehouse.
    pub fn income(
        product_id: ProductId,
        quantity: i64,
        reference: Option<AggregateId>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::new(product_id, quantity, MovementKind::Income, reference, occurred_at)
    }

    /// Stock leaving the warehouse.
    pub fn expense(
        product_id: ProductId,
        quantity: i64,
        reference: Option<AggregateId>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::new(product_id, quantity, MovementKind::Expense, reference, occurred_at)
    }

    /// Quantity with the sign of the movement applied.
    pub fn signed_quantity(&self) -> i64 {
        match self.kind {
            MovementKind::Income => self.quantity,
            MovementKind::Expense => -self.quantity,
        }
    }
}

/// Net stock change described by a slice of movements.
pub fn net_change(movements: &[StockMovement]) -> i64 {
    movements.iter().map(StockMovement::signed_quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantity_movement_is_rejected() {
        let err = StockMovement::income(ProductId::generate(), 0, None, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn net_change_subtracts_expenses() {
        let product_id = ProductId::generate();
        let movements = vec![
            StockMovement::income(product_id, 10, None, Utc::now()).unwrap(),
            StockMovement::expense(product_id, 3, None, Utc::now()).unwrap(),
            StockMovement::income(product_id, 1, None, Utc::now()).unwrap(),
        ];
        assert_eq!(net_change(&movements), 8);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [MovementKind::Income, MovementKind::Expense] {
            assert_eq!(MovementKind::parse(kind.as_str()).unwrap(), kind);
        }
    }
}
