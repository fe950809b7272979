//! Purchase records and the rules of the purchase ledger.
//!
//! Purchases are append-only. The only mutation is cancellation, and only from `pending`.
//! New purchases are recorded directly as `completed` (no payment authorization step
//! exists), so cancellation through the documented flow is currently unreachable in
//! practice; the rule is kept as-is rather than widened to completed purchases.

use crate::error::{DropError, StoreError};
use crate::pricing::PriceQuote;
use crate::types::{Actor, DropId, Money, PurchaseId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Awaiting completion; the only cancellable status
    Pending,
    /// Finalized
    Completed,
    /// Cancelled while pending
    Cancelled,
}

impl PurchaseStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(StoreError::Corrupt(format!("Invalid purchase status: {s}"))),
        }
    }

    /// Whether the status can never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A buyer's claim on units of a drop, with its price snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Purchase identifier
    pub id: PurchaseId,
    /// Drop purchased from
    pub drop_id: DropId,
    /// Buyer
    pub buyer_id: UserId,
    /// Units purchased
    pub quantity: u32,
    /// Catalog unit price at purchase time
    pub unit_price: Money,
    /// Creator markup per unit at purchase time
    pub creator_markup: Money,
    /// `(unit_price + creator_markup) * quantity`
    pub total_price: Money,
    /// Current status
    pub status: PurchaseStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    /// Records a priced purchase with the given status.
    #[must_use]
    pub const fn new(
        id: PurchaseId,
        drop_id: DropId,
        buyer_id: UserId,
        quote: &PriceQuote,
        status: PurchaseStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            drop_id,
            buyer_id,
            quantity: quote.quantity,
            unit_price: quote.unit_price,
            creator_markup: quote.creator_markup,
            total_price: quote.total_price,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Authorization and status-transition rules for purchases.
#[derive(Clone, Copy, Debug, Default)]
pub struct PurchaseLedger;

impl PurchaseLedger {
    /// Fails unless `actor` is the buyer or staff.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::Forbidden`] for anyone else.
    pub fn authorize(purchase: &Purchase, actor: &Actor) -> Result<(), DropError> {
        if actor.may_act_for(purchase.buyer_id) {
            Ok(())
        } else {
            Err(DropError::forbidden(format!(
                "purchase {} belongs to another user",
                purchase.id
            )))
        }
    }

    /// Moves a pending purchase to `cancelled`.
    ///
    /// Inventory is not returned to the drop.
    ///
    /// # Errors
    ///
    /// - [`DropError::Forbidden`] if `actor` may not act on the purchase.
    /// - [`DropError::AlreadyFinal`] if the purchase is `completed` or `cancelled`; the
    ///   purchase is left untouched.
    pub fn cancel(
        purchase: &mut Purchase,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), DropError> {
        Self::authorize(purchase, actor)?;
        if purchase.status.is_terminal() {
            return Err(DropError::AlreadyFinal {
                purchase_id: purchase.id,
                status: purchase.status,
            });
        }
        purchase.status = PurchaseStatus::Cancelled;
        purchase.updated_at = now;
        Ok(())
    }
}
