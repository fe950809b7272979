//! Purchase endpoints.
//!
//! - `GET /purchases` - The caller's purchases, newest first
//! - `GET /purchases/:id` - One purchase (buyer or staff)
//! - `POST /purchases/:id/cancel` - Cancel a pending purchase

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::handlers::ListResponse;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use drop_engine_core::purchase::Purchase;
use drop_engine_core::types::PurchaseId;

/// The caller's purchases.
///
/// # Errors
///
/// `500` on store failure.
pub async fn list_purchases(
    user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Purchase>>, AppError> {
    Ok(Json(state.engine.purchases_for(user.user_id()).await?.into()))
}

/// One purchase.
///
/// # Errors
///
/// `403` when the caller is neither the buyer nor staff, `404` for an unknown id.
pub async fn get_purchase(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<PurchaseId>,
) -> Result<Json<Purchase>, AppError> {
    Ok(Json(state.engine.get_purchase(id, &user.actor()).await?))
}

/// Cancel a pending purchase.
///
/// Sold units are not returned to the drop.
///
/// # Errors
///
/// `400` when the purchase is already completed or cancelled, `403` when the caller is
/// neither the buyer nor staff, `404` for an unknown id.
pub async fn cancel_purchase(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<PurchaseId>,
) -> Result<Json<Purchase>, AppError> {
    Ok(Json(state.engine.cancel_purchase(id, user.actor()).await?))
}
