//! `PostgreSQL` storage for the drop engine.
//!
//! [`PostgresDropStore`] implements the `DropStore` trait from `drop-engine-core`
//! with sqlx:
//!
//! - One transaction per purchase, serialized per drop with `SELECT … FOR UPDATE`
//! - Follow relations and follower counts updated under the creator row lock
//! - Serialization failures and deadlocks surfaced as retryable conflicts
//! - Embedded migrations ([`PostgresDropStore::migrate`])
//!
//! # Example
//!
//! ```no_run
//! use drop_engine_postgres::{PostgresConfig, PostgresDropStore};
//! use drop_engine_core::store::DropStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresDropStore::connect("postgres://localhost/drops", &PostgresConfig::default()).await?;
//! store.migrate().await?;
//! let store: Arc<dyn DropStore> = Arc::new(store);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod rows;
mod store;

pub use store::{PostgresConfig, PostgresDropStore};
