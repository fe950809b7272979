//! In-memory [`DropStore`] with row-scoped serialization.
//!
//! Each drop, creator, and purchase lives behind its own async mutex. A purchase holds only
//! its drop's mutex while it stages the change on a copy, and commits the copy together
//! with the new purchase record. Operations on different rows never wait on each other.
//!
//! Lock order is drop row → table lock → creator or purchase row. No creator or purchase
//! row is held while waiting for a table lock.

use drop_engine_core::creator::{
    CatalogEntry, Creator, FollowOutcome, FollowerCounter, UnfollowOutcome,
};
use drop_engine_core::drops::{Drop, DropQuery};
use drop_engine_core::error::{DropError, StoreError};
use drop_engine_core::purchase::{Purchase, PurchaseLedger};
use drop_engine_core::store::{DropStore, StoreFuture};
use drop_engine_core::transaction::{PurchaseOutcome, PurchaseRequest, PurchaseTransaction};
use drop_engine_core::types::{Actor, CreatorId, DropId, ProductId, PurchaseId, UserId};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug)]
struct CreatorRow {
    creator: Creator,
    followers: HashSet<UserId>,
}

#[derive(Debug, Default)]
struct CreatorTable {
    rows: HashMap<CreatorId, Arc<Mutex<CreatorRow>>>,
    handles: HashMap<String, CreatorId>,
}

#[derive(Debug)]
struct PurchaseRow {
    drop_id: DropId,
    buyer_id: UserId,
    record: Mutex<Purchase>,
}

/// In-memory drop store.
///
/// Cloning is cheap and clones share state.
///
/// # Example
///
/// ```
/// use drop_engine_runtime::InMemoryDropStore;
/// use drop_engine_core::store::DropStore;
/// use std::sync::Arc;
///
/// let store: Arc<dyn DropStore> = Arc::new(InMemoryDropStore::new());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryDropStore {
    creators: Arc<RwLock<CreatorTable>>,
    products: Arc<RwLock<HashMap<ProductId, CatalogEntry>>>,
    drops: Arc<RwLock<HashMap<DropId, Arc<Mutex<Drop>>>>>,
    purchases: Arc<RwLock<HashMap<PurchaseId, Arc<PurchaseRow>>>>,
    fail_purchase_writes: Arc<AtomicBool>,
}

impl InMemoryDropStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every purchase fail at the write step, after the reservation was staged.
    ///
    /// Used to exercise the all-or-nothing guarantee.
    pub fn fail_purchase_writes(&self, fail: bool) {
        self.fail_purchase_writes.store(fail, Ordering::SeqCst);
    }

    /// Appends a purchase record as-is, bypassing the purchase transaction.
    ///
    /// Lets the catalog import records (and tests seed `pending` purchases). The drop's
    /// counters are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the id is already taken.
    pub async fn insert_purchase(&self, purchase: Purchase) -> Result<(), DropError> {
        let mut purchases = self.purchases.write().await;
        if purchases.contains_key(&purchase.id) {
            return Err(StoreError::Database(format!("duplicate purchase id {}", purchase.id)).into());
        }
        purchases.insert(purchase.id, Arc::new(new_purchase_row(purchase)));
        Ok(())
    }

    /// Number of stored purchases across all drops.
    pub async fn purchase_count(&self) -> usize {
        self.purchases.read().await.len()
    }

    async fn drop_row(&self, id: DropId) -> Result<Arc<Mutex<Drop>>, DropError> {
        self.drops
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DropError::not_found("drop", id))
    }

    async fn creator_row(&self, id: CreatorId) -> Result<Arc<Mutex<CreatorRow>>, DropError> {
        self.creators
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| DropError::not_found("creator", id))
    }

    async fn purchase_row(&self, id: PurchaseId) -> Result<Arc<PurchaseRow>, DropError> {
        self.purchases
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DropError::not_found("purchase", id))
    }

    async fn load_product(&self, id: ProductId) -> Result<CatalogEntry, DropError> {
        self.products
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DropError::not_found("product", id))
    }

    async fn upsert_creator(&self, creator: Creator) -> Result<Creator, DropError> {
        let mut table = self.creators.write().await;
        if let Some(&owner) = table.handles.get(&creator.handle) {
            if owner != creator.id {
                return Err(DropError::validation(format!(
                    "handle {} is already taken",
                    creator.handle
                )));
            }
        }

        if let Some(row) = table.rows.get(&creator.id).cloned() {
            let (previous_handle, stored) = {
                let mut row = row.lock().await;
                let previous =
                    std::mem::replace(&mut row.creator.handle, creator.handle.clone());
                row.creator.user_id = creator.user_id;
                row.creator.markup_percentage = creator.markup_percentage;
                (previous, row.creator.clone())
            };
            table.handles.remove(&previous_handle);
            table.handles.insert(stored.handle.clone(), stored.id);
            return Ok(stored);
        }

        let stored = Creator {
            followers_count: 0,
            ..creator
        };
        table.handles.insert(stored.handle.clone(), stored.id);
        table.rows.insert(
            stored.id,
            Arc::new(Mutex::new(CreatorRow {
                creator: stored.clone(),
                followers: HashSet::new(),
            })),
        );
        Ok(stored)
    }

    async fn run_purchase(
        &self,
        request: PurchaseRequest,
        purchase_id: PurchaseId,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, DropError> {
        request.validate()?;
        let row = self.drop_row(request.drop_id).await?;
        let mut current = row.lock().await;

        let product = self.load_product(current.product_id).await?;
        let creator = self
            .creator_row(current.creator_id)
            .await?
            .lock()
            .await
            .creator
            .clone();

        let mut staged = current.clone();
        let outcome = match PurchaseTransaction::execute(
            &mut staged,
            &product,
            &creator,
            &request,
            purchase_id,
            now,
        ) {
            Ok(outcome) => outcome,
            Err(err @ DropError::DropNotActive { .. }) => {
                if staged.status != current.status {
                    *current = staged;
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        if self.fail_purchase_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("purchase write failed".to_string()).into());
        }

        self.purchases
            .write()
            .await
            .insert(outcome.purchase.id, Arc::new(new_purchase_row(outcome.purchase.clone())));
        *current = staged;
        Ok(outcome)
    }

    async fn run_cancel(
        &self,
        id: PurchaseId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Purchase, DropError> {
        let row = self.purchase_row(id).await?;
        let mut current = row.record.lock().await;
        let mut staged = current.clone();
        PurchaseLedger::cancel(&mut staged, &actor, now)?;
        *current = staged.clone();
        Ok(staged)
    }
}

fn new_purchase_row(purchase: Purchase) -> PurchaseRow {
    PurchaseRow {
        drop_id: purchase.drop_id,
        buyer_id: purchase.buyer_id,
        record: Mutex::new(purchase),
    }
}

impl DropStore for InMemoryDropStore {
    fn register_creator(&self, creator: Creator) -> StoreFuture<'_, Creator> {
        Box::pin(self.upsert_creator(creator))
    }

    fn register_product(&self, product: CatalogEntry) -> StoreFuture<'_, CatalogEntry> {
        Box::pin(async move {
            self.creator_row(product.creator_id).await?;
            self.products
                .write()
                .await
                .insert(product.product_id, product.clone());
            Ok(product)
        })
    }

    fn get_creator(&self, id: CreatorId) -> StoreFuture<'_, Creator> {
        Box::pin(async move {
            let row = self.creator_row(id).await?;
            let creator = row.lock().await.creator.clone();
            Ok(creator)
        })
    }

    fn find_creator_by_handle(&self, handle: String) -> StoreFuture<'_, Creator> {
        Box::pin(async move {
            let id = self
                .creators
                .read()
                .await
                .handles
                .get(&handle)
                .copied()
                .ok_or_else(|| DropError::not_found("creator", &handle))?;
            let row = self.creator_row(id).await?;
            let creator = row.lock().await.creator.clone();
            Ok(creator)
        })
    }

    fn get_product(&self, id: ProductId) -> StoreFuture<'_, CatalogEntry> {
        Box::pin(self.load_product(id))
    }

    fn insert_drop(&self, drop: Drop) -> StoreFuture<'_, Drop> {
        Box::pin(async move {
            let mut drops = self.drops.write().await;
            if drops.contains_key(&drop.id) {
                return Err(StoreError::Database(format!("duplicate drop id {}", drop.id)).into());
            }
            drops.insert(drop.id, Arc::new(Mutex::new(drop.clone())));
            Ok(drop)
        })
    }

    fn get_drop(&self, id: DropId) -> StoreFuture<'_, Drop> {
        Box::pin(async move {
            let row = self.drop_row(id).await?;
            let drop = row.lock().await.clone();
            Ok(drop)
        })
    }

    fn list_drops(&self, query: DropQuery, now: DateTime<Utc>) -> StoreFuture<'_, Vec<Drop>> {
        Box::pin(async move {
            let rows: Vec<_> = self.drops.read().await.values().cloned().collect();
            let mut snapshot = Vec::with_capacity(rows.len());
            for row in rows {
                snapshot.push(row.lock().await.clone());
            }
            Ok(query.select(snapshot, now))
        })
    }

    fn count_purchases(&self, drop_id: DropId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let count = self
                .purchases
                .read()
                .await
                .values()
                .filter(|row| row.drop_id == drop_id)
                .count();
            Ok(u64::try_from(count).unwrap_or(u64::MAX))
        })
    }

    fn purchase(
        &self,
        request: PurchaseRequest,
        purchase_id: PurchaseId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, PurchaseOutcome> {
        Box::pin(self.run_purchase(request, purchase_id, now))
    }

    fn cancel_purchase(
        &self,
        id: PurchaseId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Purchase> {
        Box::pin(self.run_cancel(id, actor, now))
    }

    fn get_purchase(&self, id: PurchaseId) -> StoreFuture<'_, Purchase> {
        Box::pin(async move {
            let row = self.purchase_row(id).await?;
            let purchase = row.record.lock().await.clone();
            Ok(purchase)
        })
    }

    fn purchases_for_buyer(&self, buyer_id: UserId) -> StoreFuture<'_, Vec<Purchase>> {
        Box::pin(async move {
            let rows: Vec<_> = self
                .purchases
                .read()
                .await
                .values()
                .filter(|row| row.buyer_id == buyer_id)
                .cloned()
                .collect();
            let mut purchases = Vec::with_capacity(rows.len());
            for row in rows {
                purchases.push(row.record.lock().await.clone());
            }
            purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(purchases)
        })
    }

    fn follow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
        _now: DateTime<Utc>,
    ) -> StoreFuture<'_, FollowOutcome> {
        Box::pin(async move {
            let row = self.creator_row(creator_id).await?;
            let mut row = row.lock().await;
            FollowerCounter::ensure_not_self(&row.creator, follower_id)?;
            let inserted = row.followers.insert(follower_id);
            Ok(FollowerCounter::follow(&mut row.creator, inserted))
        })
    }

    fn unfollow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
    ) -> StoreFuture<'_, UnfollowOutcome> {
        Box::pin(async move {
            let row = self.creator_row(creator_id).await?;
            let mut row = row.lock().await;
            let removed = row.followers.remove(&follower_id);
            Ok(FollowerCounter::unfollow(&mut row.creator, removed))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use drop_engine_core::drops::NewDrop;
    use drop_engine_core::lifecycle::DropStatus;
    use drop_engine_core::purchase::PurchaseStatus;
    use drop_engine_core::types::Money;
    use chrono::Duration;

    struct Seeded {
        store: InMemoryDropStore,
        creator: Creator,
        drop: Drop,
    }

    async fn seeded(quantity: u32) -> Seeded {
        let store = InMemoryDropStore::new();
        let now = Utc::now();
        let creator = store
            .register_creator(Creator::new(CreatorId::new(), UserId::new(), "nova"))
            .await
            .unwrap();
        let product = store
            .register_product(CatalogEntry {
                product_id: ProductId::new(),
                creator_id: creator.id,
                title: "Cap".to_string(),
                unit_price: Money::from_cents(10_000),
            })
            .await
            .unwrap();
        let drop = NewDrop {
            creator_id: creator.id,
            product_id: product.product_id,
            title: "Cap drop".to_string(),
            description: String::new(),
            quantity,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
        }
        .into_drop(DropId::new(), now);
        let drop = store.insert_drop(drop).await.unwrap();
        Seeded {
            store,
            creator,
            drop,
        }
    }

    #[tokio::test]
    async fn purchase_commits_drop_and_record_together() {
        let s = seeded(5).await;
        let req = PurchaseRequest::new(s.drop.id, UserId::new(), 3);
        let outcome = s.store.purchase(req, PurchaseId::new(), Utc::now()).await.unwrap();

        assert_eq!(outcome.purchase.total_price.to_string(), "330.00");
        assert_eq!(s.store.get_drop(s.drop.id).await.unwrap().sold_quantity, 3);
        assert_eq!(s.store.count_purchases(s.drop.id).await.unwrap(), 1);
        assert_eq!(
            s.store.get_purchase(outcome.purchase.id).await.unwrap(),
            outcome.purchase
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_no_trace() {
        let s = seeded(5).await;
        s.store.fail_purchase_writes(true);
        let req = PurchaseRequest::new(s.drop.id, UserId::new(), 2);
        let err = s.store.purchase(req, PurchaseId::new(), Utc::now()).await.unwrap_err();

        assert!(matches!(err, DropError::Store(StoreError::Database(_))));
        assert_eq!(s.store.get_drop(s.drop.id).await.unwrap().sold_quantity, 0);
        assert_eq!(s.store.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn ended_drop_persists_status_only() {
        let s = seeded(5).await;
        let req = PurchaseRequest::new(s.drop.id, UserId::new(), 1);
        let later = s.drop.end_time + Duration::minutes(1);
        let err = s.store.purchase(req, PurchaseId::new(), later).await.unwrap_err();

        assert!(matches!(err, DropError::DropNotActive { .. }));
        let stored = s.store.get_drop(s.drop.id).await.unwrap();
        assert_eq!(stored.status, DropStatus::Ended);
        assert_eq!(stored.sold_quantity, 0);
        assert_eq!(s.store.purchase_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_drop_is_not_found() {
        let s = seeded(1).await;
        let req = PurchaseRequest::new(DropId::new(), UserId::new(), 1);
        let err = s.store.purchase(req, PurchaseId::new(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, DropError::NotFound { resource: "drop", .. }));
    }

    #[tokio::test]
    async fn cancel_only_moves_pending() {
        let s = seeded(5).await;
        let req = PurchaseRequest::new(s.drop.id, UserId::new(), 1);
        let outcome = s.store.purchase(req, PurchaseId::new(), Utc::now()).await.unwrap();
        let buyer = Actor::user(req.buyer_id);

        let err = s
            .store
            .cancel_purchase(outcome.purchase.id, buyer, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DropError::AlreadyFinal { .. }));

        let mut pending = outcome.purchase.clone();
        pending.id = PurchaseId::new();
        pending.status = PurchaseStatus::Pending;
        s.store.insert_purchase(pending.clone()).await.unwrap();

        let cancelled = s.store.cancel_purchase(pending.id, buyer, Utc::now()).await.unwrap();
        assert_eq!(cancelled.status, PurchaseStatus::Cancelled);
        assert_eq!(
            s.store.get_purchase(pending.id).await.unwrap().status,
            PurchaseStatus::Cancelled
        );
        assert_eq!(s.store.get_drop(s.drop.id).await.unwrap().sold_quantity, 1);
    }

    #[tokio::test]
    async fn follow_relation_and_count_move_together() {
        let s = seeded(1).await;
        let fan = UserId::new();

        let first = s.store.follow(s.creator.id, fan, Utc::now()).await.unwrap();
        let again = s.store.follow(s.creator.id, fan, Utc::now()).await.unwrap();
        assert_eq!(first, FollowOutcome::Created { followers_count: 1 });
        assert_eq!(again, FollowOutcome::AlreadyFollowing { followers_count: 1 });

        let removed = s.store.unfollow(s.creator.id, fan).await.unwrap();
        let missing = s.store.unfollow(s.creator.id, fan).await.unwrap();
        assert_eq!(removed, UnfollowOutcome::Removed { followers_count: 0 });
        assert_eq!(missing, UnfollowOutcome::NotFollowing { followers_count: 0 });

        let err = s
            .store
            .follow(s.creator.id, s.creator.user_id, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, DropError::SelfFollow);
    }

    #[tokio::test]
    async fn re_registering_keeps_follower_count() {
        let s = seeded(1).await;
        s.store.follow(s.creator.id, UserId::new(), Utc::now()).await.unwrap();

        let mut renamed = s.creator.clone();
        renamed.handle = "nova_studio".to_string();
        renamed.followers_count = 999;
        let stored = s.store.register_creator(renamed).await.unwrap();
        assert_eq!(stored.followers_count, 1);

        assert!(s.store.find_creator_by_handle("nova".to_string()).await.is_err());
        assert_eq!(
            s.store
                .find_creator_by_handle("nova_studio".to_string())
                .await
                .unwrap()
                .id,
            s.creator.id
        );
    }

    #[tokio::test]
    async fn duplicate_handle_is_rejected() {
        let s = seeded(1).await;
        let other = Creator::new(CreatorId::new(), UserId::new(), "nova");
        let err = s.store.register_creator(other).await.unwrap_err();
        assert!(matches!(err, DropError::Validation(_)));
    }
}
