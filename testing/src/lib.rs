//! # Drop Engine Testing
//!
//! Testing utilities for the drop engine:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - Fixtures that build and install a creator, product, and drop in one call
//! - [`PurchaseTest`], a Given-When-Then harness for the purchase transaction
//! - proptest strategies for money, markup, and quantities
//!
//! ## Example
//!
//! ```
//! use drop_engine_testing::{DropFixture, PurchaseTest, test_clock};
//! use drop_engine_core::environment::Clock;
//! use drop_engine_core::types::UserId;
//!
//! let now = test_clock().now();
//! PurchaseTest::new()
//!     .given(DropFixture::new(now).with_quantity(1))
//!     .at(now)
//!     .when_purchase(UserId::new(), 1)
//!     .then_drop(|drop| assert_eq!(drop.sold_quantity, 1))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use drop_engine_core::environment::Clock;

pub mod fixtures;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use drop_engine_testing::mocks::FixedClock;
    /// use drop_engine_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock tests move by hand, to walk a drop through its window.
    ///
    /// Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Moves the clock by `by` (may be negative).
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jumps to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers.
pub mod helpers {
    /// Installs a `tracing` subscriber that writes through the test harness.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn,drop_engine=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing strategies.
pub mod properties {
    use drop_engine_core::types::{MarkupPercentage, Money};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    /// Catalog prices from 0.01 to 99 999.99.
    pub fn money() -> impl Strategy<Value = Money> {
        (1i64..10_000_000).prop_map(Money::from_cents)
    }

    /// Markups from 0.00% to 250.00% in basis-point steps.
    pub fn markup() -> impl Strategy<Value = MarkupPercentage> {
        (0i64..=25_000).prop_map(|bp| {
            MarkupPercentage::new(Decimal::new(bp, 2)).unwrap_or(MarkupPercentage::DEFAULT)
        })
    }

    /// Quantities a single buyer might request.
    pub fn quantity() -> impl Strategy<Value = u32> {
        1u32..=20
    }
}

// Re-export commonly used items
pub use fixtures::{DropFixture, InstalledDrop};
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use purchase_test::PurchaseTest;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_moves_for_every_clone() {
        let clock = ManualClock::new(test_clock().now());
        let shared = clock.clone();
        clock.advance(Duration::minutes(5));
        assert_eq!(shared.now(), test_clock().now() + Duration::minutes(5));
        shared.set(test_clock().now());
        assert_eq!(clock.now(), test_clock().now());
    }
}
