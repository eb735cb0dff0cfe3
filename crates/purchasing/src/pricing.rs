//! Supplier price variance discovered at order time.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use procure_core::{DomainError, DomainResult, Money, money};

use crate::random::RandomSource;

/// How far a supplier's price may drift from the requested price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    /// Maximum relative deviation, e.g. `0.05` for ±5%.
    pub max_variance: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { max_variance: 0.05 }
    }
}

impl PricingPolicy {
    /// Perturb `requested` by a uniform factor in `[-v, +v]` and round the
    /// result to cents (half up).
    pub fn finalize_price(&self, requested: Money, rng: &mut dyn RandomSource) -> DomainResult<Money> {
        money::ensure_positive_price(requested, "requested unit price")?;
        money::ensure_cents(requested, "requested unit price")?;

        // Below 1 so a maximal discount still leaves a positive price.
        if !self.max_variance.is_finite() || !(0.0..1.0).contains(&self.max_variance) {
            return Err(DomainError::validation(format!(
                "price variance must be in [0, 1), got {}",
                self.max_variance
            )));
        }
        let bound = Decimal::from_f64(self.max_variance)
            .ok_or_else(|| DomainError::invariant("price variance is not representable"))?;
        let drawn = rng.uniform(-self.max_variance, self.max_variance);
        let factor = Decimal::from_f64(drawn)
            .map(|d| d.round_dp(6))
            .unwrap_or(Decimal::ZERO)
            .clamp(-bound, bound);

        let perturbed = requested
            .checked_mul(Decimal::ONE + factor)
            .ok_or_else(|| DomainError::invariant("unit price overflow"))?;
        Ok(money::round_money(perturbed))
    }
}
