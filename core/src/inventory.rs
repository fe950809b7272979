//! Inventory ledger: the check-and-increment on a drop's `sold_quantity`.
//!
//! The ledger itself is a pure function over a [`Drop`] the caller holds exclusively.
//! Atomicity comes from where it is called: inside the row lock of the in-memory store, or
//! inside a `SELECT … FOR UPDATE` transaction in `PostgreSQL`. Reading `sold_quantity` and
//! writing the new value must never be split across that boundary.

use crate::drops::Drop;
use crate::error::DropError;
use crate::lifecycle::DropStatus;
use crate::types::DropId;
use serde::{Deserialize, Serialize};

/// A successful, all-or-nothing reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Drop the units were taken from
    pub drop_id: DropId,
    /// Units reserved
    pub quantity: u32,
    /// `sold_quantity` before the reservation
    pub sold_before: u32,
    /// `sold_quantity` after the reservation
    pub sold_after: u32,
    /// Whether this reservation took the last unit
    pub sold_out: bool,
}

/// Check-and-increment rules for drop stock.
#[derive(Clone, Copy, Debug, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Reserves `quantity` units of `drop`.
    ///
    /// Either the whole request fits and `sold_quantity` grows by `quantity`, or nothing
    /// changes. Taking the last unit flips the drop to [`DropStatus::SoldOut`].
    ///
    /// # Errors
    ///
    /// - [`DropError::Validation`] if `quantity` is zero.
    /// - [`DropError::InsufficientStock`] if fewer than `quantity` units remain.
    pub fn reserve(drop: &mut Drop, quantity: u32) -> Result<Reservation, DropError> {
        if quantity == 0 {
            return Err(DropError::validation("quantity must be at least 1"));
        }

        let sold_before = drop.sold_quantity;
        let Some(sold_after) = sold_before
            .checked_add(quantity)
            .filter(|&after| after <= drop.quantity)
        else {
            return Err(DropError::InsufficientStock {
                drop_id: drop.id,
                requested: quantity,
                available: drop.remaining_quantity(),
            });
        };

        drop.sold_quantity = sold_after;
        let sold_out = sold_after == drop.quantity;
        if sold_out {
            drop.status = DropStatus::SoldOut;
        }

        tracing::trace!(
            drop_id = %drop.id,
            quantity,
            sold_before,
            sold_after,
            sold_out,
            "Inventory reserved"
        );

        Ok(Reservation {
            drop_id: drop.id,
            quantity,
            sold_before,
            sold_after,
            sold_out,
        })
    }
}
