//! Monetary amounts.
//!
//! Amounts are exact decimals kept at two fractional digits. Every amount that
//! enters the domain from a computation goes through [`round_money`].

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Monetary amount in the store currency.
pub type Money = Decimal;

/// Number of fractional digits kept for money.
pub const MONEY_SCALE: u32 = 2;

/// Round to two decimals, half away from zero ("round half up" for the
/// non-negative amounts used in purchasing). The result always carries
/// exactly [`MONEY_SCALE`] digits, matching the `NUMERIC(_, 2)` columns.
pub fn round_money(amount: Decimal) -> Money {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Reject amounts with sub-cent digits instead of rounding them silently.
pub fn ensure_cents(amount: Money, what: &str) -> DomainResult<()> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::validation(format!(
            "{what} must have at most {MONEY_SCALE} decimal places"
        )));
    }
    Ok(())
}

/// Validate that a price is strictly positive.
pub fn ensure_positive_price(price: Money, what: &str) -> DomainResult<()> {
    if price <= Decimal::ZERO {
        return Err(DomainError::validation(format!("{what} must be positive")));
    }
    Ok(())
}

/// `price × quantity` with overflow reported as an invariant violation.
pub fn line_amount(price: Money, quantity: i64) -> DomainResult<Money> {
    price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| DomainError::invariant("line amount overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn midpoint_rounds_up() {
        assert_eq!(round_money(dec("10.005")), dec("10.01"));
        assert_eq!(round_money(dec("10.004")), dec("10.00"));
        assert_eq!(round_money(dec("99.995")), dec("100.00"));
    }

    #[test]
    fn zero_and_negative_prices_are_rejected() {
        assert!(ensure_positive_price(Decimal::ZERO, "price").is_err());
        assert!(ensure_positive_price(dec("-1.00"), "price").is_err());
        assert!(ensure_positive_price(dec("0.01"), "price").is_ok());
    }

    #[test]
    fn rounded_amounts_always_carry_two_digits() {
        assert_eq!(round_money(dec("100")).to_string(), "100.00");
        assert_eq!(round_money(dec("12.5")).to_string(), "12.50");
        assert_eq!(round_money(dec("10.005")).to_string(), "10.01");
    }

    #[test]
    fn sub_cent_amounts_are_rejected() {
        assert!(ensure_cents(dec("10.005"), "price").is_err());
        assert!(ensure_cents(dec("10.500"), "price").is_ok());
        assert!(ensure_cents(dec("10"), "price").is_ok());
        match ensure_cents(dec("0.001"), "purchase price") {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("at most 2 decimal places")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    proptest! {
        /// Property: rounding never moves an amount by more than half a cent.
        #[test]
        fn rounding_error_is_at_most_half_a_cent(cents in 0i64..10_000_000, extra in 0u32..1000) {
            let amount = Decimal::new(cents * 1000 + extra as i64, 5);
            let rounded = round_money(amount);
            prop_assert!((rounded - amount).abs() <= dec("0.005"));
            prop_assert_eq!(rounded.scale(), MONEY_SCALE);
        }
    }
}
