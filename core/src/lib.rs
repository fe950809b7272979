//! # Drop Engine Core
//!
//! Domain types and rules for limited-inventory "drops": time-boxed, finite-quantity
//! offerings that many buyers race to purchase from.
//!
//! ## Components
//!
//! - [`pricing::PricingCalculator`]: unit price plus creator markup, fixed-point
//! - [`inventory::InventoryLedger`]: all-or-nothing check-and-increment of `sold_quantity`
//! - [`lifecycle::DropLifecycle`]: `upcoming → active → {sold_out | ended}`, derived lazily
//! - [`transaction::PurchaseTransaction`]: one purchase as a single unit of work
//! - [`purchase::PurchaseLedger`]: purchase authorization and cancellation rules
//! - [`creator::FollowerCounter`]: follower-count changes paired with relation changes
//! - [`store::DropStore`]: the storage contract that makes the above atomic
//!
//! Everything in this crate is synchronous and free of I/O except the [`store::DropStore`]
//! trait itself. Time is injected through [`environment::Clock`].
//!
//! ## Example
//!
//! ```
//! use drop_engine_core::pricing::PricingCalculator;
//! use drop_engine_core::types::{MarkupPercentage, Money};
//!
//! let quote = PricingCalculator::price(Money::from_cents(10_000), MarkupPercentage::DEFAULT, 3);
//! assert!(matches!(quote, Ok(q) if q.total_price.to_string() == "330.00"));
//! ```

pub mod creator;
pub mod drops;
pub mod environment;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod pricing;
pub mod purchase;
pub mod store;
pub mod transaction;
pub mod types;

pub use chrono::{DateTime, Utc};
pub use creator::{CatalogEntry, Creator, Follow, FollowOutcome, FollowerCounter, UnfollowOutcome};
pub use drops::{Drop, DropDetail, DropQuery, DropSummary, NewDrop};
pub use environment::{Clock, SystemClock};
pub use error::{DropError, ErrorKind, StoreError};
pub use inventory::{InventoryLedger, Reservation};
pub use lifecycle::{DropLifecycle, DropStatus};
pub use pricing::{PriceQuote, PricingCalculator};
pub use purchase::{Purchase, PurchaseLedger, PurchaseStatus};
pub use store::{DropStore, StoreFuture};
pub use transaction::{PurchaseOutcome, PurchaseRequest, PurchaseTransaction};
pub use types::{Actor, CreatorId, DropId, MarkupPercentage, Money, ProductId, PurchaseId, UserId};
