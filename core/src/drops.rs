//! The drop entity, its creation request, read models, and listing queries.

use crate::creator::{CatalogEntry, Creator};
use crate::error::DropError;
use crate::lifecycle::{DropLifecycle, DropStatus};
use crate::types::{CreatorId, DropId, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a drop title.
pub const MAX_TITLE_LEN: usize = 255;

/// A time-boxed, finite-quantity offering of one catalog product.
///
/// `quantity` is fixed at creation. `sold_quantity` only grows, and only through
/// [`InventoryLedger::reserve`](crate::inventory::InventoryLedger::reserve).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drop {
    /// Drop identifier
    pub id: DropId,
    /// Owning creator
    pub creator_id: CreatorId,
    /// Catalog product being sold
    pub product_id: ProductId,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Total units offered
    pub quantity: u32,
    /// Units claimed so far
    pub sold_quantity: u32,
    /// Furthest lifecycle status reached
    pub status: DropStatus,
    /// Window opens (inclusive)
    pub start_time: DateTime<Utc>,
    /// Window closes (exclusive)
    pub end_time: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Drop {
    /// Units still available.
    #[must_use]
    pub const fn remaining_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.sold_quantity)
    }

    /// Share of units sold, `0.0..=100.0`.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        if self.quantity == 0 {
            return 0.0;
        }
        f64::from(self.sold_quantity) * 100.0 / f64::from(self.quantity)
    }

    /// Lifecycle status at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> DropStatus {
        DropLifecycle::derive(self, now)
    }
}

/// Request to open a new drop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDrop {
    /// Creator profile the drop is published under
    pub creator_id: CreatorId,
    /// Product being sold
    pub product_id: ProductId,
    /// Display title
    pub title: String,
    /// Display description
    #[serde(default)]
    pub description: String,
    /// Total units offered
    pub quantity: u32,
    /// Window opens
    pub start_time: DateTime<Utc>,
    /// Window closes
    pub end_time: DateTime<Utc>,
}

impl NewDrop {
    /// Validates the request shape.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::Validation`] for an empty or oversized title, zero quantity,
    /// or a window that does not end after it starts.
    pub fn validate(&self) -> Result<(), DropError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DropError::validation("title must not be empty"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(DropError::validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        if self.quantity == 0 {
            return Err(DropError::validation("quantity must be at least 1"));
        }
        if self.start_time >= self.end_time {
            return Err(DropError::validation("start_time must be before end_time"));
        }
        Ok(())
    }

    /// Builds the drop record; status is derived from `now` so a drop created inside its
    /// window starts `active`.
    #[must_use]
    pub fn into_drop(self, id: DropId, now: DateTime<Utc>) -> Drop {
        let mut drop = Drop {
            id,
            creator_id: self.creator_id,
            product_id: self.product_id,
            title: self.title.trim().to_string(),
            description: self.description,
            quantity: self.quantity,
            sold_quantity: 0,
            status: DropStatus::Upcoming,
            start_time: self.start_time,
            end_time: self.end_time,
            created_at: now,
            updated_at: now,
        };
        drop.status = DropLifecycle::derive(&drop, now);
        drop
    }
}

/// List-view projection of a drop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropSummary {
    /// Drop identifier
    pub id: DropId,
    /// Owning creator
    pub creator_id: CreatorId,
    /// Owning creator's handle
    pub creator_handle: String,
    /// Catalog product
    pub product_id: ProductId,
    /// Catalog product title
    pub product_title: String,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Total units
    pub quantity: u32,
    /// Units sold
    pub sold_quantity: u32,
    /// `quantity - sold_quantity`
    pub remaining_quantity: u32,
    /// `100 * sold_quantity / quantity`
    pub progress_percentage: f64,
    /// Derived status at read time
    pub status: DropStatus,
    /// Window opens
    pub start_time: DateTime<Utc>,
    /// Window closes
    pub end_time: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl DropSummary {
    /// Projects `drop`, with its creator and product, as seen at `now`.
    #[must_use]
    pub fn at(drop: &Drop, creator: &Creator, product: &CatalogEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: drop.id,
            creator_id: drop.creator_id,
            creator_handle: creator.handle.clone(),
            product_id: drop.product_id,
            product_title: product.title.clone(),
            title: drop.title.clone(),
            description: drop.description.clone(),
            quantity: drop.quantity,
            sold_quantity: drop.sold_quantity,
            remaining_quantity: drop.remaining_quantity(),
            progress_percentage: drop.progress_percentage(),
            status: drop.status_at(now),
            start_time: drop.start_time,
            end_time: drop.end_time,
            created_at: drop.created_at,
        }
    }
}

/// Detail-view projection of a drop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropDetail {
    /// Summary fields
    #[serde(flatten)]
    pub summary: DropSummary,
    /// Number of purchase records against the drop
    pub purchases_count: u64,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Maximum number of drops returned by [`DropQuery::Trending`].
pub const TRENDING_LIMIT: usize = 10;

/// Listing queries over drops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropQuery {
    /// Currently purchasable, newest start first
    Active,
    /// Not yet open, soonest start first
    Upcoming,
    /// Active or sold out, best sellers first, at most [`TRENDING_LIMIT`]
    Trending,
}

impl DropQuery {
    /// Whether `drop` belongs in this listing at `now`.
    #[must_use]
    pub fn matches(self, drop: &Drop, now: DateTime<Utc>) -> bool {
        let status = drop.status_at(now);
        match self {
            Self::Active => status == DropStatus::Active,
            Self::Upcoming => status == DropStatus::Upcoming,
            Self::Trending => matches!(status, DropStatus::Active | DropStatus::SoldOut),
        }
    }

    /// Filters, orders, and truncates candidate drops for this listing.
    ///
    /// Backends may pre-filter in storage; this is the authoritative final pass.
    #[must_use]
    pub fn select(self, drops: Vec<Drop>, now: DateTime<Utc>) -> Vec<Drop> {
        let mut selected: Vec<Drop> = drops
            .into_iter()
            .filter(|drop| self.matches(drop, now))
            .collect();
        match self {
            Self::Active => selected.sort_by(|a, b| b.start_time.cmp(&a.start_time)),
            Self::Upcoming => selected.sort_by(|a, b| a.start_time.cmp(&b.start_time)),
            Self::Trending => {
                selected.sort_by(|a, b| {
                    b.sold_quantity
                        .cmp(&a.sold_quantity)
                        .then_with(|| b.start_time.cmp(&a.start_time))
                });
                selected.truncate(TRENDING_LIMIT);
            }
        }
        selected
    }
}
