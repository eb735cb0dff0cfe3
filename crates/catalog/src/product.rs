use serde::{Deserialize, Serialize};

use procure_core::{DomainError, DomainResult, Money, typed_id};

typed_id!(
    /// Product identifier.
    ProductId
);

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            other => Err(DomainError::validation(format!("unknown product status '{other}'"))),
        }
    }
}

/// Catalog product as seen by purchasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Units on hand.
    pub stock: i64,
    /// Reference cost per unit.
    pub unit_cost: Money,
    pub status: ProductStatus,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, stock: i64, unit_cost: Money) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            stock,
            unit_cost,
            status: ProductStatus::Active,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn deactivate(&mut self) {
        self.status = ProductStatus::Inactive;
    }

    /// Apply a stock delta, returning the new stock level.
    ///
    /// Invariant: stock never goes negative.
    pub fn increment_stock(&mut self, delta: i64) -> DomainResult<i64> {
        let next = self
            .stock
            .checked_add(delta)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        if next < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        self.stock = next;
        Ok(next)
    }
}
