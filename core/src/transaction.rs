//! The purchase transaction: lifecycle check, reservation, pricing, and the purchase record
//! as one unit of work.
//!
//! [`PurchaseTransaction::execute`] mutates an exclusively held [`Drop`] and returns the
//! purchase to append. It performs no I/O. Storage backends call it while holding the drop
//! row and persist the updated drop together with the purchase, or neither.

use crate::creator::{CatalogEntry, Creator};
use crate::drops::Drop;
use crate::error::{DropError, StoreError};
use crate::inventory::{InventoryLedger, Reservation};
use crate::lifecycle::{DropLifecycle, DropStatus};
use crate::pricing::PricingCalculator;
use crate::purchase::{Purchase, PurchaseStatus};
use crate::types::{DropId, PurchaseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One buyer's request to claim units of a drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Drop to buy from
    pub drop_id: DropId,
    /// Authenticated buyer
    pub buyer_id: UserId,
    /// Units requested
    pub quantity: u32,
}

impl PurchaseRequest {
    /// Creates a request.
    #[must_use]
    pub const fn new(drop_id: DropId, buyer_id: UserId, quantity: u32) -> Self {
        Self {
            drop_id,
            buyer_id,
            quantity,
        }
    }

    /// Rejects a zero quantity before any row is touched.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::Validation`] if `quantity` is zero.
    pub fn validate(&self) -> Result<(), DropError> {
        if self.quantity == 0 {
            return Err(DropError::validation("quantity must be at least 1"));
        }
        Ok(())
    }
}

/// Everything a successful purchase changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchaseOutcome {
    /// The `completed` purchase to append
    pub purchase: Purchase,
    /// The stock taken
    pub reservation: Reservation,
    /// Stored drop status before the transaction
    pub previous_status: DropStatus,
    /// Stored drop status after the transaction
    pub status: DropStatus,
}

/// Purchase orchestration over an exclusively held drop row.
#[derive(Clone, Copy, Debug, Default)]
pub struct PurchaseTransaction;

impl PurchaseTransaction {
    /// Runs one purchase against `drop`.
    ///
    /// On success `drop` carries the new `sold_quantity`, status, and `updated_at`. On
    /// [`DropError::DropNotActive`] the stored status may still have advanced (for example
    /// to `ended`) and may be persisted on its own. On any other error `drop` must be
    /// discarded.
    ///
    /// # Errors
    ///
    /// - [`DropError::Validation`] for a zero quantity.
    /// - [`DropError::DropNotActive`] outside the active window or after sellout.
    /// - [`DropError::InsufficientStock`] if the whole quantity does not fit.
    /// - [`DropError::Pricing`] on arithmetic overflow.
    /// - [`StoreError::Corrupt`] if `product` or `creator` do not belong to `drop`.
    pub fn execute(
        drop: &mut Drop,
        product: &CatalogEntry,
        creator: &Creator,
        request: &PurchaseRequest,
        purchase_id: PurchaseId,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, DropError> {
        request.validate()?;
        if drop.id != request.drop_id
            || product.product_id != drop.product_id
            || creator.id != drop.creator_id
        {
            return Err(StoreError::Corrupt(format!(
                "drop {} loaded with mismatched product or creator",
                drop.id
            ))
            .into());
        }

        let previous_status = drop.status;
        DropLifecycle::advance(drop, now);
        DropLifecycle::ensure_accepting(drop, now)?;

        let reservation = InventoryLedger::reserve(drop, request.quantity)?;
        let quote =
            PricingCalculator::price(product.unit_price, creator.markup_percentage, request.quantity)?;

        // Re-derive after the reservation; sellout is already applied by the ledger.
        DropLifecycle::advance(drop, now);
        drop.updated_at = now;

        let purchase = Purchase::new(
            purchase_id,
            drop.id,
            request.buyer_id,
            &quote,
            PurchaseStatus::Completed,
            now,
        );

        tracing::debug!(
            drop_id = %drop.id,
            purchase_id = %purchase.id,
            buyer_id = %request.buyer_id,
            quantity = request.quantity,
            total_price = %purchase.total_price,
            sold_out = reservation.sold_out,
            "Purchase staged"
        );

        Ok(PurchaseOutcome {
            purchase,
            reservation,
            previous_status,
            status: drop.status,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{CreatorId, MarkupPercentage, Money, ProductId};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    struct Setup {
        drop: Drop,
        product: CatalogEntry,
        creator: Creator,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
    }

    fn setup(quantity: u32, sold: u32) -> Setup {
        let creator = Creator::new(CreatorId::new(), UserId::new(), "atelier")
            .with_markup(MarkupPercentage::new(Decimal::new(75, 1)).unwrap());
        let product = CatalogEntry {
            product_id: ProductId::new(),
            creator_id: creator.id,
            title: "Print".to_string(),
            unit_price: Money::from_cents(1_999),
        };
        let drop = Drop {
            id: DropId::new(),
            creator_id: creator.id,
            product_id: product.product_id,
            title: "Limited print".to_string(),
            description: String::new(),
            quantity,
            sold_quantity: sold,
            status: DropStatus::Upcoming,
            start_time: now() - Duration::hours(1),
            end_time: now() + Duration::hours(1),
            created_at: now() - Duration::days(2),
            updated_at: now() - Duration::days(2),
        };
        Setup {
            drop,
            product,
            creator,
        }
    }

    fn request(s: &Setup, quantity: u32) -> PurchaseRequest {
        PurchaseRequest::new(s.drop.id, UserId::new(), quantity)
    }

    #[test]
    fn completes_and_prices() {
        let mut s = setup(10, 0);
        let req = request(&s, 2);
        let outcome =
            PurchaseTransaction::execute(&mut s.drop, &s.product, &s.creator, &req, PurchaseId::new(), now())
                .unwrap();

        assert_eq!(outcome.purchase.status, PurchaseStatus::Completed);
        assert_eq!(outcome.purchase.total_price.to_string(), "42.98");
        assert_eq!(outcome.purchase.buyer_id, req.buyer_id);
        assert_eq!(outcome.previous_status, DropStatus::Upcoming);
        assert_eq!(outcome.status, DropStatus::Active);
        assert_eq!(s.drop.sold_quantity, 2);
        assert_eq!(s.drop.updated_at, now());
    }

    #[test]
    fn last_unit_sells_out() {
        let mut s = setup(3, 2);
        let req = request(&s, 1);
        let outcome =
            PurchaseTransaction::execute(&mut s.drop, &s.product, &s.creator, &req, PurchaseId::new(), now())
                .unwrap();
        assert!(outcome.reservation.sold_out);
        assert_eq!(s.drop.status, DropStatus::SoldOut);
    }

    #[test]
    fn ended_drop_rejects_but_advances() {
        let mut s = setup(3, 0);
        let req = request(&s, 1);
        let later = s.drop.end_time + Duration::minutes(5);
        let err =
            PurchaseTransaction::execute(&mut s.drop, &s.product, &s.creator, &req, PurchaseId::new(), later)
                .unwrap_err();
        assert!(matches!(
            err,
            DropError::DropNotActive { status: DropStatus::Ended, .. }
        ));
        assert_eq!(s.drop.status, DropStatus::Ended);
        assert_eq!(s.drop.sold_quantity, 0);
    }

    #[test]
    fn insufficient_stock_leaves_drop_untouched() {
        let mut s = setup(3, 2);
        let req = request(&s, 2);
        let before = s.drop.sold_quantity;
        let err =
            PurchaseTransaction::execute(&mut s.drop, &s.product, &s.creator, &req, PurchaseId::new(), now())
                .unwrap_err();
        assert!(matches!(err, DropError::InsufficientStock { available: 1, .. }));
        assert_eq!(s.drop.sold_quantity, before);
    }

    #[test]
    fn mismatched_product_is_corrupt() {
        let mut s = setup(3, 0);
        s.product.product_id = ProductId::new();
        let req = request(&s, 1);
        let err =
            PurchaseTransaction::execute(&mut s.drop, &s.product, &s.creator, &req, PurchaseId::new(), now())
                .unwrap_err();
        assert!(matches!(err, DropError::Store(StoreError::Corrupt(_))));
        assert_eq!(s.drop.sold_quantity, 0);
    }

    #[test]
    fn zero_quantity_is_validation() {
        let mut s = setup(3, 0);
        let req = request(&s, 0);
        let err =
            PurchaseTransaction::execute(&mut s.drop, &s.product, &s.creator, &req, PurchaseId::new(), now())
                .unwrap_err();
        assert!(matches!(err, DropError::Validation(_)));
    }
}
