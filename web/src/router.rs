//! Router composition.

use crate::handlers::{creators, drops, health, purchases};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Create the drop engine router with all endpoints.
///
/// # Routes
///
/// ## Drops
/// - `POST /drops` - Open a drop
/// - `GET /drops/active` - Active drops
/// - `GET /drops/upcoming` - Upcoming drops
/// - `GET /drops/trending` - Trending drops
/// - `GET /drops/:id` - Drop detail
/// - `POST /drops/:id/purchase` - Buy units
///
/// ## Purchases
/// - `GET /purchases` - Caller's purchases
/// - `GET /purchases/:id` - One purchase
/// - `POST /purchases/:id/cancel` - Cancel a pending purchase
///
/// ## Creators
/// - `POST /creators/:handle/follow` - Follow
/// - `POST /creators/:handle/unfollow` - Unfollow
///
/// ## Health
/// - `GET /health` - Liveness
///
/// # Example
///
/// ```rust,ignore
/// let engine = DropEngine::new(Arc::new(InMemoryDropStore::new()), Arc::new(SystemClock));
/// let app = router(AppState::new(engine));
/// axum::serve(listener, app).await?;
/// ```
pub fn router(state: AppState) -> Router {
    Router::new()
        // Drops
        .route("/drops", post(drops::create_drop))
        .route("/drops/active", get(drops::active_drops))
        .route("/drops/upcoming", get(drops::upcoming_drops))
        .route("/drops/trending", get(drops::trending_drops))
        .route("/drops/:id", get(drops::get_drop))
        .route("/drops/:id/purchase", post(drops::purchase))
        // Purchases
        .route("/purchases", get(purchases::list_purchases))
        .route("/purchases/:id", get(purchases::get_purchase))
        .route("/purchases/:id/cancel", post(purchases::cancel_purchase))
        // Creators
        .route("/creators/:handle/follow", post(creators::follow))
        .route("/creators/:handle/unfollow", post(creators::unfollow))
        // Health
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
