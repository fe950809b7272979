//! Drop engine behaviour over the in-memory store.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::{DateTime, Duration, Utc};
use drop_engine_core::creator::{Creator, FollowOutcome, UnfollowOutcome};
use drop_engine_core::drops::NewDrop;
use drop_engine_core::environment::Clock;
use drop_engine_core::error::{DropError, ErrorKind, StoreError};
use drop_engine_core::lifecycle::DropStatus;
use drop_engine_core::purchase::PurchaseStatus;
use drop_engine_core::types::{Actor, CreatorId, DropId, Money, PurchaseId, UserId};
use drop_engine_runtime::{DropEngine, InMemoryDropStore, RetryPolicy};
use drop_engine_testing::helpers::init_test_tracing;
use drop_engine_testing::{DropFixture, InstalledDrop, ManualClock};
use std::sync::Arc;

struct Harness {
    engine: DropEngine,
    store: InMemoryDropStore,
    clock: ManualClock,
    installed: InstalledDrop,
}

async fn harness(configure: impl FnOnce(DropFixture) -> DropFixture) -> Harness {
    init_test_tracing();
    let now = Utc::now();
    let clock = ManualClock::new(now);
    let store = InMemoryDropStore::new();
    let installed = configure(DropFixture::new(now)).install(&store).await.unwrap();
    let engine = DropEngine::new(Arc::new(store.clone()), Arc::new(clock.clone()))
        .with_retry_policy(RetryPolicy::none());
    Harness {
        engine,
        store,
        clock,
        installed,
    }
}

impl Harness {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn stored_status(&self, id: DropId) -> DropStatus {
        self.engine.store().get_drop(id).await.unwrap().status
    }
}

#[tokio::test]
async fn purchase_prices_and_counts() {
    let h = harness(|f| f.with_quantity(5)).await;
    let buyer = UserId::new();

    let purchase = h.engine.purchase(h.installed.drop.id, buyer, 3).await.unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.unit_price.to_string(), "100.00");
    assert_eq!(purchase.creator_markup.to_string(), "10.00");
    assert_eq!(purchase.total_price.to_string(), "330.00");

    let detail = h.engine.get_drop(h.installed.drop.id).await.unwrap();
    assert_eq!(detail.summary.sold_quantity, 3);
    assert_eq!(detail.summary.remaining_quantity, 2);
    assert!((detail.summary.progress_percentage - 60.0).abs() < f64::EPSILON);
    assert_eq!(detail.summary.creator_handle, h.installed.creator.handle);
    assert_eq!(detail.summary.product_title, "Limited hoodie");
    assert_eq!(detail.purchases_count, 1);
}

#[tokio::test]
async fn zero_quantity_is_rejected_before_the_store() {
    let h = harness(|f| f).await;
    let err = h.engine.purchase(h.installed.drop.id, UserId::new(), 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.store.purchase_count().await, 0);
}

#[tokio::test]
async fn failure_after_reservation_changes_nothing() {
    let h = harness(|f| f.with_quantity(5)).await;
    h.store.fail_purchase_writes(true);

    let err = h.engine.purchase(h.installed.drop.id, UserId::new(), 2).await.unwrap_err();
    assert!(matches!(err, DropError::Store(StoreError::Database(_))));

    let detail = h.engine.get_drop(h.installed.drop.id).await.unwrap();
    assert_eq!(detail.summary.sold_quantity, 0);
    assert_eq!(detail.purchases_count, 0);

    h.store.fail_purchase_writes(false);
    h.engine.purchase(h.installed.drop.id, UserId::new(), 2).await.unwrap();
    assert_eq!(h.engine.get_drop(h.installed.drop.id).await.unwrap().summary.sold_quantity, 2);
}

#[tokio::test]
async fn pricing_failure_after_reservation_changes_nothing() {
    let h = harness(|f| f.with_quantity(5).with_unit_price(Money::MAX)).await;

    let err = h.engine.purchase(h.installed.drop.id, UserId::new(), 2).await.unwrap_err();
    assert!(matches!(err, DropError::Pricing(_)), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Internal);

    let detail = h.engine.get_drop(h.installed.drop.id).await.unwrap();
    assert_eq!(detail.summary.sold_quantity, 0);
    assert_eq!(detail.summary.status, DropStatus::Active);
    assert_eq!(detail.purchases_count, 0);
    assert_eq!(h.store.purchase_count().await, 0);
}

#[tokio::test]
async fn lifecycle_follows_the_clock_and_never_regresses() {
    let h = harness(|f| f.upcoming(Duration::minutes(30))).await;
    let drop_id = h.installed.drop.id;

    let err = h.engine.purchase(drop_id, UserId::new(), 1).await.unwrap_err();
    assert!(matches!(err, DropError::DropNotActive { status: DropStatus::Upcoming, .. }));
    assert_eq!(h.engine.upcoming_drops().await.unwrap().len(), 1);
    assert!(h.engine.active_drops().await.unwrap().is_empty());

    h.clock.advance(Duration::minutes(31));
    h.engine.purchase(drop_id, UserId::new(), 1).await.unwrap();
    assert_eq!(h.engine.active_drops().await.unwrap().len(), 1);

    h.clock.advance(Duration::hours(3));
    let err = h.engine.purchase(drop_id, UserId::new(), 1).await.unwrap_err();
    assert!(matches!(err, DropError::DropNotActive { status: DropStatus::Ended, .. }));
    assert_eq!(h.stored_status(drop_id).await, DropStatus::Ended);

    // A clock stepping back inside the window must not reopen the drop.
    h.clock.advance(Duration::hours(-3));
    assert_eq!(h.engine.get_drop(drop_id).await.unwrap().summary.status, DropStatus::Ended);
    assert!(h.engine.purchase(drop_id, UserId::new(), 1).await.is_err());
}

#[tokio::test]
async fn sold_out_stays_sold_out_after_the_window() {
    let h = harness(|f| f.with_quantity(2)).await;
    let drop_id = h.installed.drop.id;
    h.engine.purchase(drop_id, UserId::new(), 2).await.unwrap();

    h.clock.advance(Duration::days(1));
    let detail = h.engine.get_drop(drop_id).await.unwrap();
    assert_eq!(detail.summary.status, DropStatus::SoldOut);

    let trending = h.engine.trending_drops().await.unwrap();
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0].id, drop_id);
}

#[tokio::test]
async fn product_price_change_only_affects_future_purchases() {
    let h = harness(|f| f).await;
    let drop_id = h.installed.drop.id;
    let first = h.engine.purchase(drop_id, UserId::new(), 1).await.unwrap();

    let mut repriced = h.installed.product.clone();
    repriced.unit_price = Money::from_cents(20_000);
    h.engine.register_product(repriced).await.unwrap();

    let second = h.engine.purchase(drop_id, UserId::new(), 1).await.unwrap();
    assert_eq!(first.total_price.to_string(), "110.00");
    assert_eq!(second.total_price.to_string(), "220.00");
    assert_eq!(
        h.engine.store().get_purchase(first.id).await.unwrap().total_price,
        first.total_price
    );
}

#[tokio::test]
async fn cancellation_rules() {
    let h = harness(|f| f).await;
    let buyer = UserId::new();
    let purchase = h.engine.purchase(h.installed.drop.id, buyer, 1).await.unwrap();

    let err = h.engine.cancel_purchase(purchase.id, Actor::user(buyer)).await.unwrap_err();
    assert!(matches!(err, DropError::AlreadyFinal { status: PurchaseStatus::Completed, .. }));
    assert_eq!(
        h.engine.get_purchase(purchase.id, &Actor::user(buyer)).await.unwrap().status,
        PurchaseStatus::Completed
    );

    let mut pending = purchase.clone();
    pending.id = PurchaseId::new();
    pending.status = PurchaseStatus::Pending;
    h.store.insert_purchase(pending.clone()).await.unwrap();

    let err = h.engine.cancel_purchase(pending.id, Actor::user(UserId::new())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let cancelled = h.engine.cancel_purchase(pending.id, Actor::user(buyer)).await.unwrap();
    assert_eq!(cancelled.status, PurchaseStatus::Cancelled);
    let err = h.engine.cancel_purchase(pending.id, Actor::staff(UserId::new())).await.unwrap_err();
    assert!(matches!(err, DropError::AlreadyFinal { status: PurchaseStatus::Cancelled, .. }));

    // No restitution.
    assert_eq!(h.engine.get_drop(h.installed.drop.id).await.unwrap().summary.sold_quantity, 1);

    let err = h.engine.cancel_purchase(PurchaseId::new(), Actor::user(buyer)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn purchases_are_private_to_buyer_and_staff() {
    let h = harness(|f| f).await;
    let buyer = UserId::new();
    let first = h.engine.purchase(h.installed.drop.id, buyer, 1).await.unwrap();
    h.clock.advance(Duration::seconds(1));
    let second = h.engine.purchase(h.installed.drop.id, buyer, 2).await.unwrap();
    h.engine.purchase(h.installed.drop.id, UserId::new(), 1).await.unwrap();

    let mine = h.engine.purchases_for(buyer).await.unwrap();
    assert_eq!(mine.iter().map(|p| p.id).collect::<Vec<_>>(), vec![second.id, first.id]);

    let stranger = Actor::user(UserId::new());
    assert_eq!(
        h.engine.get_purchase(first.id, &stranger).await.unwrap_err().kind(),
        ErrorKind::Forbidden
    );
    assert!(h.engine.get_purchase(first.id, &Actor::staff(UserId::new())).await.is_ok());
}

#[tokio::test]
async fn create_drop_checks_ownership() {
    let h = harness(|f| f).await;
    let owner = Actor::user(h.installed.creator.user_id);
    let now = h.now();
    let new = NewDrop {
        creator_id: h.installed.creator.id,
        product_id: h.installed.product.product_id,
        title: "Second run".to_string(),
        description: "Restock".to_string(),
        quantity: 50,
        start_time: now + Duration::days(1),
        end_time: now + Duration::days(2),
    };

    let summary = h.engine.create_drop(&owner, new.clone()).await.unwrap();
    assert_eq!(summary.status, DropStatus::Upcoming);
    assert_eq!(summary.sold_quantity, 0);
    assert_eq!(summary.remaining_quantity, 50);

    let err = h.engine.create_drop(&Actor::user(UserId::new()), new.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let mut invalid = new.clone();
    invalid.end_time = invalid.start_time;
    let err = h.engine.create_drop(&owner, invalid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let other = h
        .engine
        .register_creator(Creator::new(CreatorId::new(), UserId::new(), "someone_else"))
        .await
        .unwrap();
    let mut foreign = new;
    foreign.creator_id = other.id;
    let err = h.engine.create_drop(&Actor::user(other.user_id), foreign).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn follow_by_handle() {
    let h = harness(|f| f.with_handle("maker")).await;
    let fan = UserId::new();

    assert_eq!(
        h.engine.follow("maker", fan).await.unwrap(),
        FollowOutcome::Created { followers_count: 1 }
    );
    assert_eq!(
        h.engine.follow("maker", fan).await.unwrap(),
        FollowOutcome::AlreadyFollowing { followers_count: 1 }
    );
    assert_eq!(
        h.engine.follow("maker", h.installed.creator.user_id).await.unwrap_err(),
        DropError::SelfFollow
    );
    assert_eq!(
        h.engine.follow("ghost", fan).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    assert_eq!(
        h.engine.unfollow("maker", fan).await.unwrap(),
        UnfollowOutcome::Removed { followers_count: 0 }
    );
    assert_eq!(
        h.engine.unfollow("maker", fan).await.unwrap(),
        UnfollowOutcome::NotFollowing { followers_count: 0 }
    );
}
