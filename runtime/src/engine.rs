//! The drop engine service: the entry point every transport calls.
//!
//! `DropEngine` owns no state of its own. It validates requests, asks the [`DropStore`] to
//! run each unit of work atomically, retries write conflicts, and records logs and
//! metrics.

use crate::metrics;
use crate::retry::{RetryPolicy, retry_on_conflict};
use chrono::{DateTime, Utc};
use drop_engine_core::creator::{CatalogEntry, Creator, FollowOutcome, FollowerCounter, UnfollowOutcome};
use drop_engine_core::drops::{Drop, DropDetail, DropQuery, DropSummary, NewDrop};
use drop_engine_core::environment::Clock;
use drop_engine_core::error::{DropError, ErrorKind};
use drop_engine_core::purchase::{Purchase, PurchaseLedger};
use drop_engine_core::store::DropStore;
use drop_engine_core::transaction::PurchaseRequest;
use drop_engine_core::types::{Actor, CreatorId, DropId, ProductId, PurchaseId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Drop engine service.
///
/// Cheap to clone; clones share the store and clock.
#[derive(Clone)]
pub struct DropEngine {
    store: Arc<dyn DropStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl DropEngine {
    /// Creates an engine over `store` with the default retry policy.
    #[must_use]
    pub fn new(store: Arc<dyn DropStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the write-conflict retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DropStore> {
        &self.store
    }

    // ========================================================================
    // Catalog sync
    // ========================================================================

    /// Inserts or updates a creator profile pushed by the catalog.
    ///
    /// # Errors
    ///
    /// [`DropError::Validation`] for a malformed or taken handle, or a store failure.
    pub async fn register_creator(&self, creator: Creator) -> Result<Creator, DropError> {
        creator.validate()?;
        let stored = self.store.register_creator(creator).await?;
        tracing::info!(creator_id = %stored.id, handle = %stored.handle, "Creator registered");
        Ok(stored)
    }

    /// Inserts or updates a catalog entry. Only future purchases see a new price.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] for an unknown creator, or a store failure.
    pub async fn register_product(&self, product: CatalogEntry) -> Result<CatalogEntry, DropError> {
        let stored = self.store.register_product(product).await?;
        tracing::info!(
            product_id = %stored.product_id,
            unit_price = %stored.unit_price,
            "Product registered"
        );
        Ok(stored)
    }

    // ========================================================================
    // Drops
    // ========================================================================

    /// Opens a new drop on behalf of the creator owning `new.creator_id`.
    ///
    /// # Errors
    ///
    /// - [`DropError::Validation`] for an invalid request.
    /// - [`DropError::NotFound`] for an unknown creator or product.
    /// - [`DropError::Forbidden`] if `actor` does not own the creator profile, or the
    ///   product belongs to another creator.
    pub async fn create_drop(&self, actor: &Actor, new: NewDrop) -> Result<DropSummary, DropError> {
        new.validate()?;

        let creator = self.store.get_creator(new.creator_id).await?;
        if creator.user_id != actor.user_id {
            return Err(DropError::forbidden("only the creator can open drops on this profile"));
        }
        let product = self.store.get_product(new.product_id).await?;
        if product.creator_id != creator.id {
            return Err(DropError::forbidden(format!(
                "product {} belongs to another creator",
                product.product_id
            )));
        }

        let now = self.clock.now();
        let drop = self.store.insert_drop(new.into_drop(DropId::new(), now)).await?;
        metrics::record_drop_created();
        tracing::info!(
            drop_id = %drop.id,
            creator_id = %drop.creator_id,
            quantity = drop.quantity,
            status = %drop.status,
            "Drop created"
        );
        Ok(DropSummary::at(&drop, &creator, &product, now))
    }

    /// Drop detail with derived status and purchase count.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] if unknown.
    pub async fn get_drop(&self, id: DropId) -> Result<DropDetail, DropError> {
        let drop = self.store.get_drop(id).await?;
        let purchases_count = self.store.count_purchases(id).await?;
        let creator = self.store.get_creator(drop.creator_id).await?;
        let product = self.store.get_product(drop.product_id).await?;
        Ok(DropDetail {
            summary: DropSummary::at(&drop, &creator, &product, self.clock.now()),
            purchases_count,
            updated_at: drop.updated_at,
        })
    }

    /// Runs a listing query at the current time.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn list_drops(&self, query: DropQuery) -> Result<Vec<DropSummary>, DropError> {
        let now = self.clock.now();
        let drops = self.store.list_drops(query, now).await?;
        self.summarize(&drops, now).await
    }

    /// Projects drops with their creator handle and product title, loading each
    /// creator and product once.
    async fn summarize(
        &self,
        drops: &[Drop],
        now: DateTime<Utc>,
    ) -> Result<Vec<DropSummary>, DropError> {
        let mut creators: HashMap<CreatorId, Creator> = HashMap::new();
        let mut products: HashMap<ProductId, CatalogEntry> = HashMap::new();
        let mut summaries = Vec::with_capacity(drops.len());
        for drop in drops {
            if !creators.contains_key(&drop.creator_id) {
                let creator = self.store.get_creator(drop.creator_id).await?;
                creators.insert(drop.creator_id, creator);
            }
            if !products.contains_key(&drop.product_id) {
                let product = self.store.get_product(drop.product_id).await?;
                products.insert(drop.product_id, product);
            }
            let (Some(creator), Some(product)) =
                (creators.get(&drop.creator_id), products.get(&drop.product_id))
            else {
                continue;
            };
            summaries.push(DropSummary::at(drop, creator, product, now));
        }
        Ok(summaries)
    }

    /// Drops currently accepting purchases, newest start first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn active_drops(&self) -> Result<Vec<DropSummary>, DropError> {
        self.list_drops(DropQuery::Active).await
    }

    /// Drops not yet open, soonest start first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn upcoming_drops(&self) -> Result<Vec<DropSummary>, DropError> {
        self.list_drops(DropQuery::Upcoming).await
    }

    /// Active and sold-out drops by units sold, at most ten.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn trending_drops(&self) -> Result<Vec<DropSummary>, DropError> {
        self.list_drops(DropQuery::Trending).await
    }

    // ========================================================================
    // Purchases
    // ========================================================================

    /// Buys `quantity` units of a drop for `buyer_id`.
    ///
    /// The whole purchase is one atomic unit in the store; write conflicts are retried
    /// with the configured policy, business failures are returned immediately.
    ///
    /// # Errors
    ///
    /// [`DropError::Validation`], [`DropError::NotFound`], [`DropError::DropNotActive`],
    /// [`DropError::InsufficientStock`], or a store failure.
    pub async fn purchase(
        &self,
        drop_id: DropId,
        buyer_id: UserId,
        quantity: u32,
    ) -> Result<Purchase, DropError> {
        let started = Instant::now();
        let request = PurchaseRequest::new(drop_id, buyer_id, quantity);
        let purchase_id = PurchaseId::new();

        let result = match request.validate() {
            Ok(()) => {
                retry_on_conflict(&self.retry, "purchase", || {
                    self.store.purchase(request, purchase_id, self.clock.now())
                })
                .await
            }
            Err(err) => Err(err),
        };
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(outcome) => {
                let revenue_cents = outcome
                    .purchase
                    .total_price
                    .cents()
                    .and_then(|cents| u64::try_from(cents).ok())
                    .unwrap_or_default();
                metrics::record_purchase_completed(
                    quantity,
                    revenue_cents,
                    outcome.reservation.sold_out,
                    elapsed,
                );
                tracing::info!(
                    %drop_id,
                    purchase_id = %outcome.purchase.id,
                    %buyer_id,
                    quantity,
                    total_price = %outcome.purchase.total_price,
                    sold_after = outcome.reservation.sold_after,
                    "Purchase completed"
                );
                if outcome.reservation.sold_out {
                    tracing::info!(%drop_id, "Drop sold out");
                }
                Ok(outcome.purchase)
            }
            Err(err) => {
                metrics::record_purchase_rejected(&err, elapsed);
                if err.kind() == ErrorKind::Internal {
                    tracing::error!(%drop_id, %buyer_id, quantity, error = %err, "Purchase failed");
                } else {
                    tracing::info!(%drop_id, %buyer_id, quantity, error = %err, "Purchase rejected");
                }
                Err(err)
            }
        }
    }

    /// Cancels a pending purchase. No stock is returned to the drop.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`], [`DropError::Forbidden`], [`DropError::AlreadyFinal`].
    pub async fn cancel_purchase(&self, id: PurchaseId, actor: Actor) -> Result<Purchase, DropError> {
        let result = retry_on_conflict(&self.retry, "cancel_purchase", || {
            self.store.cancel_purchase(id, actor, self.clock.now())
        })
        .await;

        metrics::record_cancellation(result.as_ref().map(|_| ()));
        match &result {
            Ok(purchase) => {
                tracing::info!(purchase_id = %id, actor = %actor.user_id, drop_id = %purchase.drop_id, "Purchase cancelled");
            }
            Err(err) => {
                tracing::info!(purchase_id = %id, actor = %actor.user_id, error = %err, "Cancellation rejected");
            }
        }
        result
    }

    /// One purchase, visible to its buyer and staff.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] or [`DropError::Forbidden`].
    pub async fn get_purchase(&self, id: PurchaseId, actor: &Actor) -> Result<Purchase, DropError> {
        let purchase = self.store.get_purchase(id).await?;
        PurchaseLedger::authorize(&purchase, actor)?;
        Ok(purchase)
    }

    /// The buyer's purchases, newest first.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn purchases_for(&self, buyer_id: UserId) -> Result<Vec<Purchase>, DropError> {
        self.store.purchases_for_buyer(buyer_id).await
    }

    // ========================================================================
    // Follows
    // ========================================================================

    /// Follows the creator with `handle`.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] for an unknown handle, [`DropError::SelfFollow`].
    pub async fn follow(&self, handle: &str, follower_id: UserId) -> Result<FollowOutcome, DropError> {
        let creator = self.store.find_creator_by_handle(handle.to_string()).await?;
        FollowerCounter::ensure_not_self(&creator, follower_id)?;

        let outcome = retry_on_conflict(&self.retry, "follow", || {
            self.store.follow(creator.id, follower_id, self.clock.now())
        })
        .await?;

        let label = match outcome {
            FollowOutcome::Created { .. } => "created",
            FollowOutcome::AlreadyFollowing { .. } => "already_following",
        };
        metrics::record_follow("follow", label);
        tracing::info!(
            creator_id = %creator.id,
            %follower_id,
            outcome = label,
            followers_count = outcome.followers_count(),
            "Follow processed"
        );
        Ok(outcome)
    }

    /// Unfollows the creator with `handle`.
    ///
    /// # Errors
    ///
    /// [`DropError::NotFound`] for an unknown handle.
    pub async fn unfollow(&self, handle: &str, follower_id: UserId) -> Result<UnfollowOutcome, DropError> {
        let creator = self.store.find_creator_by_handle(handle.to_string()).await?;

        let outcome = retry_on_conflict(&self.retry, "unfollow", || {
            self.store.unfollow(creator.id, follower_id)
        })
        .await?;

        let label = match outcome {
            UnfollowOutcome::Removed { .. } => "removed",
            UnfollowOutcome::NotFollowing { .. } => "not_following",
        };
        metrics::record_follow("unfollow", label);
        tracing::info!(
            creator_id = %creator.id,
            %follower_id,
            outcome = label,
            followers_count = outcome.followers_count(),
            "Unfollow processed"
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for DropEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropEngine")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
