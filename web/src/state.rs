//! Application state for Axum handlers.

use drop_engine_runtime::DropEngine;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; the engine inside is reference-counted.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The drop engine every handler delegates to
    pub engine: DropEngine,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(engine: DropEngine) -> Self {
        Self { engine }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires Clone state
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
