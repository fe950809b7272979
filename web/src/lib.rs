//! Axum HTTP surface for the drop engine.
//!
//! Handlers are a thin shell over [`DropEngine`](drop_engine_runtime::DropEngine):
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** the caller (`X-User-Id`), path, and JSON body
//! 3. **Call** the engine operation
//! 4. **Map** the result, or the [`DropError`](drop_engine_core::DropError) via
//!    [`AppError`], to an HTTP response
//!
//! # Example
//!
//! ```no_run
//! use drop_engine_core::SystemClock;
//! use drop_engine_runtime::{DropEngine, InMemoryDropStore};
//! use drop_engine_web::{AppState, router};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let engine = DropEngine::new(Arc::new(InMemoryDropStore::new()), Arc::new(SystemClock));
//! let app = router(AppState::new(engine));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AuthenticatedUser, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use router::router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
