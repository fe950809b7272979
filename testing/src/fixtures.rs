//! Fixture builders for creators, products, and drops.

use chrono::{DateTime, Duration, Utc};
use drop_engine_core::creator::{CatalogEntry, Creator};
use drop_engine_core::drops::{Drop, NewDrop};
use drop_engine_core::error::DropError;
use drop_engine_core::lifecycle::DropLifecycle;
use drop_engine_core::store::DropStore;
use drop_engine_core::types::{CreatorId, DropId, MarkupPercentage, Money, ProductId, UserId};

/// Builder for a creator, one of their products, and a drop of it.
///
/// Defaults: default markup (10%), unit price 100.00, 10 units, window from one hour
/// before `now` to one hour after.
#[derive(Clone, Debug)]
pub struct DropFixture {
    now: DateTime<Utc>,
    creator: Creator,
    product: CatalogEntry,
    drop_id: DropId,
    title: String,
    quantity: u32,
    sold_quantity: u32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

/// A fixture after it was written to a store.
#[derive(Clone, Debug)]
pub struct InstalledDrop {
    /// Stored creator
    pub creator: Creator,
    /// Stored product
    pub product: CatalogEntry,
    /// Stored drop
    pub drop: Drop,
}

impl DropFixture {
    /// A fixture anchored at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        let creator_id = CreatorId::new();
        let suffix = creator_id.as_uuid().simple().to_string();
        Self {
            now,
            creator: Creator::new(creator_id, UserId::new(), format!("creator_{}", &suffix[..8])),
            product: CatalogEntry {
                product_id: ProductId::new(),
                creator_id,
                title: "Limited hoodie".to_string(),
                unit_price: Money::from_cents(10_000),
            },
            drop_id: DropId::new(),
            title: "Hoodie drop".to_string(),
            quantity: 10,
            sold_quantity: 0,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
        }
    }

    /// Total units.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Units already sold.
    #[must_use]
    pub const fn with_sold(mut self, sold: u32) -> Self {
        self.sold_quantity = sold;
        self
    }

    /// Catalog unit price.
    #[must_use]
    pub const fn with_unit_price(mut self, price: Money) -> Self {
        self.product.unit_price = price;
        self
    }

    /// Creator markup.
    #[must_use]
    pub const fn with_markup(mut self, markup: MarkupPercentage) -> Self {
        self.creator.markup_percentage = markup;
        self
    }

    /// Creator handle.
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.creator.handle = handle.into();
        self
    }

    /// Drop title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Explicit window.
    #[must_use]
    pub const fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// Window opening `starts_in` after `now`.
    #[must_use]
    pub fn upcoming(self, starts_in: Duration) -> Self {
        let start = self.now + starts_in;
        self.with_window(start, start + Duration::hours(2))
    }

    /// Window that closed `ago` before `now`.
    #[must_use]
    pub fn ended(self, ago: Duration) -> Self {
        let end = self.now - ago;
        self.with_window(end - Duration::hours(2), end)
    }

    /// The creator record.
    #[must_use]
    pub const fn creator(&self) -> &Creator {
        &self.creator
    }

    /// The product record.
    #[must_use]
    pub const fn product(&self) -> &CatalogEntry {
        &self.product
    }

    /// The creation request the creator would send.
    #[must_use]
    pub fn new_drop(&self) -> NewDrop {
        NewDrop {
            creator_id: self.creator.id,
            product_id: self.product.product_id,
            title: self.title.clone(),
            description: String::new(),
            quantity: self.quantity,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// The drop record as stored a day before `now`, with sold units applied.
    #[must_use]
    pub fn build(&self) -> Drop {
        let created = self.now - Duration::days(1);
        let mut drop = self.new_drop().into_drop(self.drop_id, created);
        drop.sold_quantity = self.sold_quantity;
        drop.status = DropLifecycle::evaluate(
            created,
            drop.start_time,
            drop.end_time,
            drop.sold_quantity,
            drop.quantity,
        );
        drop
    }

    /// Registers the creator and product and inserts the drop.
    ///
    /// # Errors
    ///
    /// Any store error.
    pub async fn install(&self, store: &dyn DropStore) -> Result<InstalledDrop, DropError> {
        let creator = store.register_creator(self.creator.clone()).await?;
        let product = store.register_product(self.product.clone()).await?;
        let drop = store.insert_drop(self.build()).await?;
        Ok(InstalledDrop {
            creator,
            product,
            drop,
        })
    }
}
