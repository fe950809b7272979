//! # Drop Engine Runtime
//!
//! The service layer over the core rules:
//!
//! - [`DropEngine`]: validated, logged, metered operations over any [`DropStore`]
//! - [`InMemoryDropStore`]: a row-locked in-memory [`DropStore`]
//! - [`retry`]: exponential backoff for store write conflicts
//! - [`metrics`]: business counters and the Prometheus exporter
//!
//! ## Example
//!
//! ```
//! use drop_engine_core::environment::SystemClock;
//! use drop_engine_runtime::{DropEngine, InMemoryDropStore};
//! use std::sync::Arc;
//!
//! let engine = DropEngine::new(Arc::new(InMemoryDropStore::new()), Arc::new(SystemClock));
//! # let _ = engine;
//! ```
//!
//! [`DropStore`]: drop_engine_core::store::DropStore

pub mod engine;
pub mod memory;
pub mod metrics;
pub mod retry;

pub use engine::DropEngine;
pub use memory::InMemoryDropStore;
pub use retry::{RetryPolicy, RetryPolicyBuilder};
