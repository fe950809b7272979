//! Creator follow endpoints.
//!
//! Both are idempotent: following twice or unfollowing a creator you do not follow
//! succeeds without changing the count.

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use drop_engine_core::creator::{FollowOutcome, UnfollowOutcome};
use serde::Serialize;

/// Response body for follow and unfollow.
#[derive(Debug, Serialize)]
pub struct FollowResponse {
    /// Human-readable result
    pub message: String,
    /// Creator's follower count after the request
    pub followers_count: u64,
}

/// Follow a creator by handle.
///
/// Returns `201` when a new relation was created and `200` when it already existed.
///
/// # Errors
///
/// `400` when following yourself, `404` for an unknown handle.
pub async fn follow(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<(StatusCode, Json<FollowResponse>), AppError> {
    let outcome = state.engine.follow(&handle, user.user_id()).await?;
    let (status, message) = match outcome {
        FollowOutcome::Created { .. } => (StatusCode::CREATED, format!("Now following {handle}")),
        FollowOutcome::AlreadyFollowing { .. } => {
            (StatusCode::OK, "Already following this creator".to_string())
        }
    };
    Ok((
        status,
        Json(FollowResponse {
            message,
            followers_count: outcome.followers_count(),
        }),
    ))
}

/// Unfollow a creator by handle.
///
/// # Errors
///
/// `404` for an unknown handle.
pub async fn unfollow(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<FollowResponse>, AppError> {
    let outcome = state.engine.unfollow(&handle, user.user_id()).await?;
    let message = match outcome {
        UnfollowOutcome::Removed { .. } => format!("Unfollowed {handle}"),
        UnfollowOutcome::NotFollowing { .. } => "Not following this creator".to_string(),
    };
    Ok(Json(FollowResponse {
        message,
        followers_count: outcome.followers_count(),
    }))
}
