//! Drop endpoints.
//!
//! - `POST /drops` - Open a new drop (creator only)
//! - `GET /drops/:id` - Drop detail with purchase count
//! - `GET /drops/active` - Drops accepting purchases
//! - `GET /drops/upcoming` - Drops not yet open
//! - `GET /drops/trending` - Best sellers among active and sold-out drops
//! - `POST /drops/:id/purchase` - Buy units of a drop

use crate::error::AppError;
use crate::extractors::{AuthenticatedUser, CorrelationId};
use crate::handlers::ListResponse;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use drop_engine_core::drops::{DropDetail, DropSummary, NewDrop};
use drop_engine_core::purchase::Purchase;
use drop_engine_core::types::DropId;
use serde::Deserialize;

/// Body of `POST /drops/:id/purchase`.
#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
    /// Units to buy (at least 1)
    pub quantity: u32,
}

/// Open a new drop.
///
/// The caller must own the creator profile named in the body.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/drops \
///   -H "X-User-Id: 7d9f…" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "creator_id": "…",
///     "product_id": "…",
///     "title": "Winter hoodie",
///     "quantity": 100,
///     "start_time": "2025-01-01T12:00:00Z",
///     "end_time": "2025-01-02T12:00:00Z"
///   }'
/// ```
///
/// # Errors
///
/// `403` when the caller does not own the profile or product, `404` for an unknown
/// creator or product, `422` for an invalid request.
pub async fn create_drop(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    body: Result<Json<NewDrop>, JsonRejection>,
) -> Result<(StatusCode, Json<DropSummary>), AppError> {
    let Json(new) = body?;
    let summary = state.engine.create_drop(&user.actor(), new).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Drop detail.
///
/// # Errors
///
/// `404` for an unknown drop.
pub async fn get_drop(
    State(state): State<AppState>,
    Path(id): Path<DropId>,
) -> Result<Json<DropDetail>, AppError> {
    Ok(Json(state.engine.get_drop(id).await?))
}

/// Drops accepting purchases, newest start first.
///
/// # Errors
///
/// `500` on store failure.
pub async fn active_drops(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<DropSummary>>, AppError> {
    Ok(Json(state.engine.active_drops().await?.into()))
}

/// Drops not yet open, soonest start first.
///
/// # Errors
///
/// `500` on store failure.
pub async fn upcoming_drops(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<DropSummary>>, AppError> {
    Ok(Json(state.engine.upcoming_drops().await?.into()))
}

/// Up to ten active or sold-out drops, most units sold first.
///
/// # Errors
///
/// `500` on store failure.
pub async fn trending_drops(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<DropSummary>>, AppError> {
    Ok(Json(state.engine.trending_drops().await?.into()))
}

/// Buy units of a drop.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/drops/<id>/purchase \
///   -H "X-User-Id: 7d9f…" \
///   -H "Content-Type: application/json" \
///   -d '{"quantity": 2}'
/// ```
///
/// # Errors
///
/// `400` when the drop is not active or lacks stock, `404` for an unknown drop, `422`
/// for a zero quantity.
pub async fn purchase(
    user: AuthenticatedUser,
    correlation_id: CorrelationId,
    State(state): State<AppState>,
    Path(id): Path<DropId>,
    body: Result<Json<PurchaseBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Purchase>), AppError> {
    let Json(body) = body?;
    tracing::debug!(
        correlation_id = %correlation_id.0,
        drop_id = %id,
        buyer_id = %user.user_id(),
        quantity = body.quantity,
        "Purchase requested"
    );
    let purchase = state
        .engine
        .purchase(id, user.user_id(), body.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}
