//! [`DropStore`] over a `PostgreSQL` connection pool.

use crate::error::{corrupt, is_unique_violation, store_error};
use crate::rows::{
    CREATOR_COLUMNS, DROP_COLUMNS, PRODUCT_COLUMNS, PURCHASE_COLUMNS, creator_from_row,
    drop_from_row, product_from_row, purchase_from_row, to_db_quantity,
};
use chrono::{DateTime, Utc};
use drop_engine_core::creator::{
    CatalogEntry, Creator, FollowOutcome, FollowerCounter, UnfollowOutcome,
};
use drop_engine_core::drops::{Drop, DropQuery, TRENDING_LIMIT};
use drop_engine_core::error::{DropError, StoreError};
use drop_engine_core::purchase::{Purchase, PurchaseLedger};
use drop_engine_core::store::{DropStore, StoreFuture};
use drop_engine_core::transaction::{PurchaseOutcome, PurchaseRequest, PurchaseTransaction};
use drop_engine_core::types::{Actor, CreatorId, DropId, ProductId, PurchaseId, UserId};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;

/// Connection pool settings.
#[derive(Clone, Debug)]
pub struct PostgresConfig {
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a connection before failing
    pub connect_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// `PostgreSQL`-backed drop store.
///
/// A purchase runs as one transaction: the drop row is locked with `SELECT … FOR UPDATE`,
/// the purchase transaction runs against it, and the updated drop and the new purchase
/// commit together. Concurrent buyers of the same drop queue on that row lock; buyers of
/// other drops do not contend.
///
/// # Example
///
/// ```no_run
/// use drop_engine_postgres::{PostgresConfig, PostgresDropStore};
///
/// # async fn example() -> Result<(), drop_engine_core::error::DropError> {
/// let store = PostgresDropStore::connect("postgres://localhost/drops", &PostgresConfig::default()).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresDropStore {
    pool: PgPool,
}

impl PostgresDropStore {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`](drop_engine_core::error::StoreError::Database) if
    /// no connection could be established.
    pub async fn connect(database_url: &str, config: &PostgresConfig) -> Result<Self, DropError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| store_error("connect", &e))?;
        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Runs database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<(), DropError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Appends a purchase record as-is, bypassing the purchase transaction.
    ///
    /// Used to import historical records; the drop's counters are not touched.
    ///
    /// # Errors
    ///
    /// Returns a store error if the insert fails (for example a duplicate id).
    pub async fn insert_purchase(&self, purchase: &Purchase) -> Result<(), DropError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_error("acquire connection", &e))?;
        insert_purchase_row(&mut conn, purchase).await
    }

    async fn upsert_creator(&self, creator: Creator) -> Result<Creator, DropError> {
        let sql = format!(
            r"
            INSERT INTO creators (id, user_id, handle, markup_percentage, followers_count)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (id) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                handle = EXCLUDED.handle,
                markup_percentage = EXCLUDED.markup_percentage
            RETURNING {CREATOR_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(creator.id.as_uuid())
            .bind(creator.user_id.as_uuid())
            .bind(&creator.handle)
            .bind(creator.markup_percentage.value())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DropError::validation(format!("handle {} is already taken", creator.handle))
                } else {
                    store_error("upsert creator", &e)
                }
            })?;
        creator_from_row(&row)
    }

    async fn upsert_product(&self, product: CatalogEntry) -> Result<CatalogEntry, DropError> {
        let exists: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM creators WHERE id = $1")
            .bind(product.creator_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("load creator", &e))?;
        if exists.is_none() {
            return Err(DropError::not_found("creator", product.creator_id));
        }

        let sql = format!(
            r"
            INSERT INTO products (id, creator_id, title, unit_price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET creator_id = EXCLUDED.creator_id,
                title = EXCLUDED.title,
                unit_price = EXCLUDED.unit_price
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(product.product_id.as_uuid())
            .bind(product.creator_id.as_uuid())
            .bind(&product.title)
            .bind(product.unit_price.amount())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("upsert product", &e))?;
        product_from_row(&row)
    }

    async fn load_creator(&self, id: CreatorId) -> Result<Creator, DropError> {
        let sql = format!("SELECT {CREATOR_COLUMNS} FROM creators WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("load creator", &e))?
            .ok_or_else(|| DropError::not_found("creator", id))?;
        creator_from_row(&row)
    }

    async fn load_creator_by_handle(&self, handle: String) -> Result<Creator, DropError> {
        let sql = format!("SELECT {CREATOR_COLUMNS} FROM creators WHERE handle = $1");
        let row = sqlx::query(&sql)
            .bind(&handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("load creator", &e))?
            .ok_or_else(|| DropError::not_found("creator", &handle))?;
        creator_from_row(&row)
    }

    async fn load_product(&self, id: ProductId) -> Result<CatalogEntry, DropError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("load product", &e))?
            .ok_or_else(|| DropError::not_found("product", id))?;
        product_from_row(&row)
    }

    async fn create_drop(&self, drop: Drop) -> Result<Drop, DropError> {
        let sql = format!(
            r"
            INSERT INTO drops (
                id, creator_id, product_id, title, description, quantity,
                sold_quantity, status, start_time, end_time, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {DROP_COLUMNS}
            "
        );
        let row = sqlx::query(&sql)
            .bind(drop.id.as_uuid())
            .bind(drop.creator_id.as_uuid())
            .bind(drop.product_id.as_uuid())
            .bind(&drop.title)
            .bind(&drop.description)
            .bind(to_db_quantity("quantity", drop.quantity)?)
            .bind(to_db_quantity("sold_quantity", drop.sold_quantity)?)
            .bind(drop.status.as_str())
            .bind(drop.start_time)
            .bind(drop.end_time)
            .bind(drop.created_at)
            .bind(drop.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("insert drop", &e))?;

        tracing::info!(drop_id = %drop.id, quantity = drop.quantity, "Drop stored");
        drop_from_row(&row)
    }

    async fn load_drop(&self, id: DropId) -> Result<Drop, DropError> {
        let sql = format!("SELECT {DROP_COLUMNS} FROM drops WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("load drop", &e))?
            .ok_or_else(|| DropError::not_found("drop", id))?;
        drop_from_row(&row)
    }

    async fn query_drops(&self, query: DropQuery, now: DateTime<Utc>) -> Result<Vec<Drop>, DropError> {
        // Mirrors DropQuery::matches so that the trending limit applies to the right rows.
        let filter = match query {
            DropQuery::Active => "status IN ('upcoming', 'active') AND sold_quantity < quantity \
                 AND start_time <= $1 AND end_time > $1 \
                 ORDER BY start_time DESC"
                .to_string(),
            DropQuery::Upcoming => "status = 'upcoming' AND sold_quantity < quantity \
                 AND start_time > $1 \
                 ORDER BY start_time ASC"
                .to_string(),
            DropQuery::Trending => format!(
                "(status = 'sold_out' OR sold_quantity >= quantity \
                  OR (status IN ('upcoming', 'active') AND start_time <= $1 AND end_time > $1)) \
                 ORDER BY sold_quantity DESC, start_time DESC \
                 LIMIT {TRENDING_LIMIT}"
            ),
        };

        let sql = format!("SELECT {DROP_COLUMNS} FROM drops WHERE {filter}");
        let rows = sqlx::query(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list drops", &e))?;
        let drops = rows.iter().map(drop_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(query.select(drops, now))
    }

    async fn count_drop_purchases(&self, drop_id: DropId) -> Result<u64, DropError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM purchases WHERE drop_id = $1")
            .bind(drop_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("count purchases", &e))?;
        u64::try_from(count).map_err(|e| corrupt("purchase count", e))
    }

    async fn run_purchase(
        &self,
        request: PurchaseRequest,
        purchase_id: PurchaseId,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, DropError> {
        request.validate()?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin purchase", &e))?;

        // Exclusive lock on the drop row until commit or rollback.
        let sql = format!("SELECT {DROP_COLUMNS} FROM drops WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(request.drop_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_error("lock drop", &e))?
            .ok_or_else(|| DropError::not_found("drop", request.drop_id))?;
        let current = drop_from_row(&row)?;

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let product = sqlx::query(&sql)
            .bind(current.product_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_error("load product", &e))?
            .ok_or_else(|| DropError::not_found("product", current.product_id))
            .and_then(|row| product_from_row(&row))?;

        let sql = format!("SELECT {CREATOR_COLUMNS} FROM creators WHERE id = $1");
        let creator = sqlx::query(&sql)
            .bind(current.creator_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_error("load creator", &e))?
            .ok_or_else(|| DropError::not_found("creator", current.creator_id))
            .and_then(|row| creator_from_row(&row))?;

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
                    update_drop(&mut tx, &staged).await?;
                    tx.commit()
                        .await
                        .map_err(|e| store_error("commit status", &e))?;
                } else {
                    let _ = tx.rollback().await;
                }
                return Err(err);
            }
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(err);
            }
        };

        update_drop(&mut tx, &staged).await?;
        insert_purchase_row(&mut tx, &outcome.purchase).await?;
        tx.commit()
            .await
            .map_err(|e| store_error("commit purchase", &e))?;

        Ok(outcome)
    }

    async fn run_cancel(
        &self,
        id: PurchaseId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Purchase, DropError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin cancel", &e))?;

        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1 FOR UPDATE");
        let mut purchase = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| store_error("lock purchase", &e))?
            .ok_or_else(|| DropError::not_found("purchase", id))
            .and_then(|row| purchase_from_row(&row))?;

        if let Err(err) = PurchaseLedger::cancel(&mut purchase, &actor, now) {
            let _ = tx.rollback().await;
            return Err(err);
        }

        sqlx::query("UPDATE purchases SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(purchase.status.as_str())
            .bind(purchase.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("cancel purchase", &e))?;
        tx.commit()
            .await
            .map_err(|e| store_error("commit cancel", &e))?;

        Ok(purchase)
    }

    async fn load_purchase(&self, id: PurchaseId) -> Result<Purchase, DropError> {
        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("load purchase", &e))?
            .ok_or_else(|| DropError::not_found("purchase", id))?;
        purchase_from_row(&row)
    }

    async fn load_buyer_purchases(&self, buyer_id: UserId) -> Result<Vec<Purchase>, DropError> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE buyer_id = $1 \
             ORDER BY created_at DESC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(buyer_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list purchases", &e))?;
        rows.iter().map(purchase_from_row).collect()
    }

    async fn run_follow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<FollowOutcome, DropError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin follow", &e))?;
        let mut creator = lock_creator(&mut tx, creator_id).await?;

        if let Err(err) = FollowerCounter::ensure_not_self(&creator, follower_id) {
            let _ = tx.rollback().await;
            return Err(err);
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO follows (follower_id, creator_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, creator_id) DO NOTHING
            ",
        )
        .bind(follower_id.as_uuid())
        .bind(creator_id.as_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("insert follow", &e))?
        .rows_affected()
            == 1;

        let outcome = FollowerCounter::follow(&mut creator, inserted);
        if inserted {
            set_followers_count(&mut tx, &creator).await?;
        }
        tx.commit()
            .await
            .map_err(|e| store_error("commit follow", &e))?;
        Ok(outcome)
    }

    async fn run_unfollow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
    ) -> Result<UnfollowOutcome, DropError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin unfollow", &e))?;
        let mut creator = lock_creator(&mut tx, creator_id).await?;

        let removed = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND creator_id = $2")
            .bind(follower_id.as_uuid())
            .bind(creator_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("delete follow", &e))?
            .rows_affected()
            == 1;

        let before = creator.followers_count;
        let outcome = FollowerCounter::unfollow(&mut creator, removed);
        if creator.followers_count != before {
            set_followers_count(&mut tx, &creator).await?;
        }
        tx.commit()
            .await
            .map_err(|e| store_error("commit unfollow", &e))?;
        Ok(outcome)
    }
}

async fn update_drop(conn: &mut PgConnection, drop: &Drop) -> Result<(), DropError> {
    sqlx::query(
        r"
        UPDATE drops
        SET sold_quantity = $2, status = $3, updated_at = $4
        WHERE id = $1
        ",
    )
    .bind(drop.id.as_uuid())
    .bind(to_db_quantity("sold_quantity", drop.sold_quantity)?)
    .bind(drop.status.as_str())
    .bind(drop.updated_at)
    .execute(conn)
    .await
    .map_err(|e| store_error("update drop", &e))?;
    Ok(())
}

async fn insert_purchase_row(conn: &mut PgConnection, purchase: &Purchase) -> Result<(), DropError> {
    sqlx::query(
        r"
        INSERT INTO purchases (
            id, drop_id, buyer_id, quantity, unit_price, creator_markup,
            total_price, status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ",
    )
    .bind(purchase.id.as_uuid())
    .bind(purchase.drop_id.as_uuid())
    .bind(purchase.buyer_id.as_uuid())
    .bind(to_db_quantity("quantity", purchase.quantity)?)
    .bind(purchase.unit_price.amount())
    .bind(purchase.creator_markup.amount())
    .bind(purchase.total_price.amount())
    .bind(purchase.status.as_str())
    .bind(purchase.created_at)
    .bind(purchase.updated_at)
    .execute(conn)
    .await
    .map_err(|e| store_error("insert purchase", &e))?;
    Ok(())
}

async fn lock_creator(conn: &mut PgConnection, id: CreatorId) -> Result<Creator, DropError> {
    let sql = format!("SELECT {CREATOR_COLUMNS} FROM creators WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(|e| store_error("lock creator", &e))?
        .ok_or_else(|| DropError::not_found("creator", id))?;
    creator_from_row(&row)
}

async fn set_followers_count(conn: &mut PgConnection, creator: &Creator) -> Result<(), DropError> {
    let count = i64::try_from(creator.followers_count)
        .map_err(|e| corrupt("followers_count", e))?;
    sqlx::query("UPDATE creators SET followers_count = $2 WHERE id = $1")
        .bind(creator.id.as_uuid())
        .bind(count)
        .execute(conn)
        .await
        .map_err(|e| store_error("update followers", &e))?;
    Ok(())
}

impl DropStore for PostgresDropStore {
    fn register_creator(&self, creator: Creator) -> StoreFuture<'_, Creator> {
        Box::pin(self.upsert_creator(creator))
    }

    fn register_product(&self, product: CatalogEntry) -> StoreFuture<'_, CatalogEntry> {
        Box::pin(self.upsert_product(product))
    }

    fn get_creator(&self, id: CreatorId) -> StoreFuture<'_, Creator> {
        Box::pin(self.load_creator(id))
    }

    fn find_creator_by_handle(&self, handle: String) -> StoreFuture<'_, Creator> {
        Box::pin(self.load_creator_by_handle(handle))
    }

    fn get_product(&self, id: ProductId) -> StoreFuture<'_, CatalogEntry> {
        Box::pin(self.load_product(id))
    }

    fn insert_drop(&self, drop: Drop) -> StoreFuture<'_, Drop> {
        Box::pin(self.create_drop(drop))
    }

    fn get_drop(&self, id: DropId) -> StoreFuture<'_, Drop> {
        Box::pin(self.load_drop(id))
    }

    fn list_drops(&self, query: DropQuery, now: DateTime<Utc>) -> StoreFuture<'_, Vec<Drop>> {
        Box::pin(self.query_drops(query, now))
    }

    fn count_purchases(&self, drop_id: DropId) -> StoreFuture<'_, u64> {
        Box::pin(self.count_drop_purchases(drop_id))
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
        Box::pin(self.load_purchase(id))
    }

    fn purchases_for_buyer(&self, buyer_id: UserId) -> StoreFuture<'_, Vec<Purchase>> {
        Box::pin(self.load_buyer_purchases(buyer_id))
    }

    fn follow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, FollowOutcome> {
        Box::pin(self.run_follow(creator_id, follower_id, now))
    }

    fn unfollow(
        &self,
        creator_id: CreatorId,
        follower_id: UserId,
    ) -> StoreFuture<'_, UnfollowOutcome> {
        Box::pin(self.run_unfollow(creator_id, follower_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_settings() {
        let config = PostgresConfig::default();
        assert_eq!(config.max_connections, 10);
        assert!(config.min_connections <= config.max_connections);
    }
}
