//! Storage contract for drops, purchases, creators, products, and follow relations.
//!
//! # Atomicity
//!
//! Implementations must make two operations indivisible:
//!
//! - [`DropStore::purchase`]: the drop row is held exclusively while
//!   [`PurchaseTransaction::execute`](crate::transaction::PurchaseTransaction::execute)
//!   runs, and the updated drop and the new purchase are committed together or not at all.
//! - [`DropStore::follow`] / [`DropStore::unfollow`]: the relation insert/delete and the
//!   creator's `followers_count` change commit together.
//!
//! Exclusion is scoped to one drop or one creator row. Work on different rows must not
//! contend.
//!
//! # Implementations
//!
//! - `InMemoryDropStore` (in `drop-engine-runtime`): row mutexes, for tests and single-node use
//! - `PostgresDropStore` (in `drop-engine-postgres`): `SELECT … FOR UPDATE` transactions
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures so the engine can hold an `Arc<dyn DropStore>`.

use crate::creator::{CatalogEntry, Creator, FollowOutcome, UnfollowOutcome};
use crate::drops::{Drop, DropQuery};
use crate::error::DropError;
use crate::purchase::Purchase;
use crate::transaction::{PurchaseOutcome, PurchaseRequest};
use crate::types::{Actor, CreatorId, DropId, ProductId, PurchaseId, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every [`DropStore`] method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DropError>> + Send + 'a>>;

/// Persistence for the drop engine.
pub trait DropStore: Send + Sync {
    /// Inserts or updates a creator profile pushed by the catalog.
    ///
    /// `followers_count` is owned by the store and is never overwritten by an update.
    ///
    /// # Errors
    ///
    /// - [`DropError::Validation`] if the handle is taken by another profile.
    /// - [`DropError::Store`] on backend failure.
    fn register_creator(&self, creator: Creator) -> StoreFuture<'_, Creator>;

    /// Inserts or updates a catalog entry. Existing purchases keep their price snapshot.
    ///
    /// # Errors
    ///
    /// - [`DropError::NotFound`] if the owning creator is unknown.
    /// - [`DropError::Store`] on backend failure.
    fn register_product(&self, product: CatalogEntry) -> StoreFuture<'_, CatalogEntry>;

    /// Loads a creator profile.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] if unknown.
    fn get_creator(&self, id: CreatorId) -> StoreFuture<'_, Creator>;

    /// Loads a creator profile by handle.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] if unknown.
    fn find_creator_by_handle(&self, handle: String) -> StoreFuture<'_, Creator>;

    /// Loads a catalog entry.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] if unknown.
    fn get_product(&self, id: ProductId) -> StoreFuture<'_, CatalogEntry>;

    /// Persists a new drop.
    ///
    /// # Errors
    ///
    /// [`DropError::Store`] on backend failure or duplicate id.
    fn insert_drop(&self, drop: Drop) -> StoreFuture<'_, Drop>;

    /// Loads a drop as stored.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] if unknown.
    fn get_drop(&self, id: DropId) -> StoreFuture<'_, Drop>;

    /// Loads drops for a listing, already filtered, ordered, and truncated with
    /// [`DropQuery::select`] at `now`.
    ///
    /// # Errors
    ///
    /// [`DropError::Store`] on backend failure.
    fn list_drops(&self, query: DropQuery, now: DateTime<Utc>) -> StoreFuture<'_, Vec<Drop>>;

    /// Number of purchase records against a drop.
    ///
    /// # Errors
    ///
    /// [`DropError::Store`] on backend failure.
    fn count_purchases(&self, drop_id: DropId) -> StoreFuture<'_, u64>;

    /// Runs the purchase transaction atomically against the stored drop.
    ///
    /// On [`DropError::DropNotActive`] the drop's advanced status may be persisted on its
    /// own; every other failure leaves storage unchanged.
    ///
    /// # Errors
    ///
    /// Anything [`PurchaseTransaction::execute`](crate::transaction::PurchaseTransaction::execute)
    /// returns, [`DropError::NotFound`] for an unknown drop, and
    /// [`StoreError::Conflict`](crate::error::StoreError::Conflict) on write contention.
    fn purchase(
        &self,
        request: PurchaseRequest,
        purchase_id: PurchaseId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, PurchaseOutcome>;

    /// Cancels a pending purchase atomically.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`], [`DropError::Forbidden`], or [`DropError::AlreadyFinal`].
    fn cancel_purchase(
        &self,
        id: PurchaseId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Purchase>;

    /// Loads a purchase.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] if unknown.
    fn get_purchase(&self, id: PurchaseId) -> StoreFuture<'_, Purchase>;

    /// A buyer's purchases, newest first.
    ///
    /// # Errors
    ///
    /// [`DropError::Store`] on backend failure.
    fn purchases_for_buyer(&self, buyer_id: UserId) -> StoreFuture<'_, Vec<Purchase>>;

    /// Stores the follow relation and increments the count in one unit of work.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] for an unknown creator, [`DropError::SelfFollow`].
    fn follow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, FollowOutcome>;

    /// Deletes the follow relation and decrements the count (floored at zero) in one unit
    /// of work.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] for an unknown creator.
    fn unfollow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
    ) -> StoreFuture<'_, UnfollowOutcome>;
}
