//! Row decoding and column conversions.

use crate::error::corrupt;
use drop_engine_core::creator::{CatalogEntry, Creator};
use drop_engine_core::drops::Drop;
use drop_engine_core::error::DropError;
use drop_engine_core::lifecycle::DropStatus;
use drop_engine_core::purchase::{Purchase, PurchaseStatus};
use drop_engine_core::types::{CreatorId, DropId, MarkupPercentage, Money, ProductId, PurchaseId, UserId};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

pub(crate) const CREATOR_COLUMNS: &str = "id, user_id, handle, markup_percentage, followers_count";

pub(crate) const PRODUCT_COLUMNS: &str = "id, creator_id, title, unit_price";

pub(crate) const DROP_COLUMNS: &str = "id, creator_id, product_id, title, description, quantity, \
     sold_quantity, status, start_time, end_time, created_at, updated_at";

pub(crate) const PURCHASE_COLUMNS: &str = "id, drop_id, buyer_id, quantity, unit_price, \
     creator_markup, total_price, status, created_at, updated_at";

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DropError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name).map_err(|e| corrupt(name, e))
}

fn money(row: &PgRow, name: &str) -> Result<Money, DropError> {
    Money::from_decimal(column::<Decimal>(row, name)?).map_err(|e| corrupt(name, e))
}

fn unsigned(row: &PgRow, name: &str) -> Result<u32, DropError> {
    u32::try_from(column::<i32>(row, name)?).map_err(|e| corrupt(name, e))
}

/// Converts a unit count to its `INTEGER` column.
pub(crate) fn to_db_quantity(name: &str, value: u32) -> Result<i32, DropError> {
    i32::try_from(value)
        .map_err(|_| DropError::validation(format!("{name} {value} exceeds the supported range")))
}

pub(crate) fn creator_from_row(row: &PgRow) -> Result<Creator, DropError> {
    let markup = MarkupPercentage::new(column(row, "markup_percentage")?)
        .map_err(|e| corrupt("markup_percentage", e))?;
    let followers: i64 = column(row, "followers_count")?;
    Ok(Creator {
        id: CreatorId::from_uuid(column::<Uuid>(row, "id")?),
        user_id: UserId::from_uuid(column::<Uuid>(row, "user_id")?),
        handle: column(row, "handle")?,
        markup_percentage: markup,
        followers_count: u64::try_from(followers).map_err(|e| corrupt("followers_count", e))?,
    })
}

pub(crate) fn product_from_row(row: &PgRow) -> Result<CatalogEntry, DropError> {
    Ok(CatalogEntry {
        product_id: ProductId::from_uuid(column::<Uuid>(row, "id")?),
        creator_id: CreatorId::from_uuid(column::<Uuid>(row, "creator_id")?),
        title: column(row, "title")?,
        unit_price: money(row, "unit_price")?,
    })
}

pub(crate) fn drop_from_row(row: &PgRow) -> Result<Drop, DropError> {
    let status: String = column(row, "status")?;
    Ok(Drop {
        id: DropId::from_uuid(column::<Uuid>(row, "id")?),
        creator_id: CreatorId::from_uuid(column::<Uuid>(row, "creator_id")?),
        product_id: ProductId::from_uuid(column::<Uuid>(row, "product_id")?),
        title: column(row, "title")?,
        description: column(row, "description")?,
        quantity: unsigned(row, "quantity")?,
        sold_quantity: unsigned(row, "sold_quantity")?,
        status: DropStatus::parse(&status)?,
        start_time: column(row, "start_time")?,
        end_time: column(row, "end_time")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

pub(crate) fn purchase_from_row(row: &PgRow) -> Result<Purchase, DropError> {
    let status: String = column(row, "status")?;
    Ok(Purchase {
        id: PurchaseId::from_uuid(column::<Uuid>(row, "id")?),
        drop_id: DropId::from_uuid(column::<Uuid>(row, "drop_id")?),
        buyer_id: UserId::from_uuid(column::<Uuid>(row, "buyer_id")?),
        quantity: unsigned(row, "quantity")?,
        unit_price: money(row, "unit_price")?,
        creator_markup: money(row, "creator_markup")?,
        total_price: money(row, "total_price")?,
        status: PurchaseStatus::parse(&status)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}
