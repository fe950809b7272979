//! Buyer-facing pricing: catalog unit price plus the creator's markup.
//!
//! All arithmetic is fixed-point. The markup per unit is carried unrounded into the total,
//! and the total is rounded half-up to cents exactly once.

use crate::error::DropError;
use crate::types::{MarkupPercentage, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of pricing one purchase request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Catalog unit price at the time of pricing
    pub unit_price: Money,
    /// Creator markup per unit, rounded to cents for display
    pub creator_markup: Money,
    /// `(unit_price + markup) * quantity`, rounded once to cents
    pub total_price: Money,
    /// Units priced
    pub quantity: u32,
}

/// Stateless price calculator.
#[derive(Clone, Copy, Debug, Default)]
pub struct PricingCalculator;

impl PricingCalculator {
    /// Prices `quantity` units of a product at `unit_price` with the creator's `markup`.
    ///
    /// # Errors
    ///
    /// - [`DropError::Validation`] if `quantity` is zero.
    /// - [`DropError::Pricing`] if the markup or total exceeds [`Money::MAX`].
    pub fn price(
        unit_price: Money,
        markup: MarkupPercentage,
        quantity: u32,
    ) -> Result<PriceQuote, DropError> {
        if quantity == 0 {
            return Err(DropError::validation("quantity must be at least 1"));
        }

        let unit = unit_price.amount();
        let markup_per_unit = unit
            .checked_mul(markup.value())
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(|| overflow("markup", unit_price, quantity))?;

        let total = unit
            .checked_add(markup_per_unit)
            .and_then(|per_unit| per_unit.checked_mul(Decimal::from(quantity)))
            .ok_or_else(|| overflow("total", unit_price, quantity))?;

        Ok(PriceQuote {
            unit_price,
            creator_markup: Money::from_decimal(markup_per_unit)
                .map_err(|_| overflow("markup", unit_price, quantity))?,
            total_price: Money::from_decimal(total)
                .map_err(|_| overflow("total", unit_price, quantity))?,
            quantity,
        })
    }
}

fn overflow(stage: &str, unit_price: Money, quantity: u32) -> DropError {
    DropError::Pricing(format!(
        "{stage} overflowed for unit price {unit_price} x {quantity}"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn money(s: &str) -> Money {
        Decimal::from_str(s)
            .ok()
            .and_then(|d| Money::from_decimal(d).ok())
            .unwrap_or(Money::ZERO)
    }

    fn markup(s: &str) -> MarkupPercentage {
        Decimal::from_str(s)
            .ok()
            .and_then(|d| MarkupPercentage::new(d).ok())
            .unwrap_or_default()
    }

    #[test]
    fn ten_percent_on_round_price() {
        let quote = PricingCalculator::price(money("100.00"), markup("10"), 3);
        let quote = quote.unwrap();
        assert_eq!(quote.creator_markup.to_string(), "10.00");
        assert_eq!(quote.total_price.to_string(), "330.00");
        assert_eq!(quote.unit_price.to_string(), "100.00");
    }

    #[test]
    fn fractional_markup_rounds_once_on_total() {
        // 19.99 * 7.5% = 1.49925 per unit; (21.48925 * 2) = 42.9785 -> 42.98
        let quote = PricingCalculator::price(money("19.99"), markup("7.5"), 2);
        let quote = quote.unwrap();
        assert_eq!(quote.total_price.to_string(), "42.98");
        assert_eq!(quote.creator_markup.to_string(), "1.50");
    }

    #[test]
    fn rounding_per_unit_would_drift() {
        // 0.05 * 10% = 0.005 per unit; per-unit rounding would give 0.06 * 3 = 0.18
        let quote = PricingCalculator::price(money("0.05"), markup("10"), 3);
        let quote = quote.unwrap();
        assert_eq!(quote.total_price.to_string(), "0.17");
    }

    #[test]
    fn zero_markup_is_plain_multiplication() {
        let quote = PricingCalculator::price(money("12.34"), markup("0"), 4);
        let quote = quote.unwrap();
        assert_eq!(quote.total_price.to_string(), "49.36");
        assert!(quote.creator_markup.is_zero());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let result = PricingCalculator::price(money("1.00"), markup("10"), 0);
        assert!(matches!(result, Err(DropError::Validation(_))));
    }

    #[test]
    fn overflow_is_a_pricing_error() {
        let result = PricingCalculator::price(Money::MAX, markup("10"), 1_000);
        assert!(matches!(result, Err(DropError::Pricing(_))));

        let result = PricingCalculator::price(Money::MAX, markup("0"), 1);
        assert_eq!(result.unwrap().total_price, Money::MAX);
    }

    proptest! {
        #[test]
        fn total_matches_single_rounding(
            cents in 0i64..10_000_000,
            markup_bp in 0u32..99_999,
            quantity in 1u32..1_000,
        ) {
            let unit = Money::from_cents(cents);
            let pct = MarkupPercentage::new(Decimal::new(i64::from(markup_bp), 2))
                .unwrap_or_default();
            let quote = PricingCalculator::price(unit, pct, quantity);
            prop_assert!(quote.is_ok());
            let quote = quote.unwrap();

            let exact = unit.amount()
                * (Decimal::ONE + pct.value() / Decimal::ONE_HUNDRED)
                * Decimal::from(quantity);
            let diff = (quote.total_price.amount() - exact).abs();
            prop_assert!(diff <= Decimal::new(5, 3));
            prop_assert!(quote.total_price.amount() >= unit.amount() * Decimal::from(quantity));
        }

        #[test]
        fn total_is_monotonic_in_quantity(cents in 1i64..1_000_000, quantity in 1u32..500) {
            let unit = Money::from_cents(cents);
            let one = PricingCalculator::price(unit, MarkupPercentage::DEFAULT, quantity);
            let two = PricingCalculator::price(unit, MarkupPercentage::DEFAULT, quantity + 1);
            prop_assert!(matches!((one, two), (Ok(a), Ok(b)) if a.total_price < b.total_price));
        }
    }
}
