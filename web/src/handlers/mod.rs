//! HTTP handlers.
//!
//! Handlers stay thin: extract, call the engine, map the result.

pub mod creators;
pub mod drops;
pub mod health;
pub mod purchases;

use serde::Serialize;

/// List envelope used by every collection endpoint.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    /// Number of results
    pub count: usize,
    /// The results
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(results: Vec<T>) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}
