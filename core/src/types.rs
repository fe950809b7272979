//! Identifiers and value objects shared by every drop engine component.
//!
//! Money is fixed-point (`rust_decimal::Decimal`) throughout; binary floating point never
//! touches a price.

use crate::error::DropError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a drop
    DropId
);
uuid_id!(
    /// Unique identifier for a purchase
    PurchaseId
);
uuid_id!(
    /// Unique identifier for a creator profile
    CreatorId
);
uuid_id!(
    /// Unique identifier for a catalog product
    ProductId
);
uuid_id!(
    /// Unique identifier for an authenticated user (buyer, follower, or creator account)
    UserId
);

// ============================================================================
// Money
// ============================================================================

/// Number of decimal places of the smallest currency unit (cents).
pub const CURRENCY_SCALE: u32 = 2;

/// Largest representable amount in cents, the capacity of a `NUMERIC(12, 2)` column.
pub const MAX_MONEY_CENTS: i64 = 999_999_999_999;

/// A non-negative currency amount, always carried at cent scale.
///
/// Bounded by [`Money::MAX`]. Construction rounds half-up to cents. Arithmetic that must not round early
/// (markup computation) works on [`Money::amount`] directly and only comes back
/// through [`Money::from_decimal`] once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, CURRENCY_SCALE));

    /// 9 999 999 999.99, see [`MAX_MONEY_CENTS`].
    pub const MAX: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, CURRENCY_SCALE));

    /// Creates a `Money` value from a whole number of cents.
    ///
    /// Input is clamped to `0..=MAX_MONEY_CENTS`.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        let mut amount = Decimal::new(cents.clamp(0, MAX_MONEY_CENTS), CURRENCY_SCALE);
        amount.rescale(CURRENCY_SCALE);
        Self(amount)
    }

    /// Creates a `Money` value from an arbitrary decimal, rounding half-up to cents.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::Validation`] if the amount is negative or rounds above
    /// [`Money::MAX`].
    pub fn from_decimal(amount: Decimal) -> Result<Self, DropError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DropError::validation(format!(
                "amount must not be negative (got {amount})"
            )));
        }
        let rounded = round_to_cents(amount);
        if rounded > Self::MAX.0 {
            return Err(DropError::validation(format!(
                "amount exceeds {} (got {amount})",
                Self::MAX
            )));
        }
        Ok(Self(rounded))
    }

    /// Returns the amount as a decimal at cent scale.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns the amount in whole cents, if it fits an `i64`.
    #[must_use]
    pub fn cents(&self) -> Option<i64> {
        self.0.checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
    }

    /// Checks if the amount is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rounds a decimal half-up (away from zero at the midpoint) to cent scale and pads it to
/// exactly two places so `330` renders as `330.00`.
#[must_use]
pub fn round_to_cents(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_SCALE);
    rounded
}

// ============================================================================
// Markup
// ============================================================================

/// Creator-specific markup, as a percentage of the catalog unit price.
///
/// Stored with up to two decimal places in `[0, 1000)`, matching a `NUMERIC(5, 2)` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkupPercentage(Decimal);

impl MarkupPercentage {
    /// Markup applied to creators that never configured one.
    pub const DEFAULT: Self = Self(Decimal::from_parts(1000, 0, 0, false, 2));

    /// Creates a markup percentage.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::Validation`] if the value is negative, not below 1000, or has
    /// more than two decimal places.
    pub fn new(percent: Decimal) -> Result<Self, DropError> {
        if percent.is_sign_negative() && !percent.is_zero() {
            return Err(DropError::validation("markup percentage must not be negative"));
        }
        if percent >= Decimal::ONE_THOUSAND {
            return Err(DropError::validation(format!(
                "markup percentage must be below 1000 (got {percent})"
            )));
        }
        if percent.normalize().scale() > CURRENCY_SCALE {
            return Err(DropError::validation(format!(
                "markup percentage supports at most two decimal places (got {percent})"
            )));
        }
        Ok(Self(percent))
    }

    /// Returns the percentage value (e.g. `7.5` for 7.5%).
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }
}

impl Default for MarkupPercentage {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for MarkupPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ============================================================================
// Actors
// ============================================================================

/// The authenticated identity behind a request, as supplied by the auth layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// Authenticated user
    pub user_id: UserId,
    /// Whether the auth layer granted this user staff rights over other users' purchases
    pub is_staff: bool,
}

impl Actor {
    /// A regular authenticated user.
    #[must_use]
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: false,
        }
    }

    /// A staff user.
    #[must_use]
    pub const fn staff(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: true,
        }
    }

    /// Whether this actor may act on a record owned by `owner`.
    #[must_use]
    pub fn may_act_for(&self, owner: UserId) -> bool {
        self.is_staff || self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap_or_default()
    }

    #[test]
    fn money_is_padded_to_cents() {
        assert_eq!(Money::from_cents(33_000).to_string(), "330.00");
        assert_eq!(Money::from_decimal(dec("12")).map(|m| m.to_string()).ok(), Some("12.00".to_string()));
    }

    #[test]
    fn money_rounds_half_up() {
        let money = Money::from_decimal(dec("42.975")).ok();
        assert_eq!(money.map(|m| m.amount()), Some(dec("42.98")));

        let money = Money::from_decimal(dec("42.974999")).ok();
        assert_eq!(money.map(|m| m.amount()), Some(dec("42.97")));
    }

    #[test]
    fn money_is_bounded_at_cent_scale() {
        assert_eq!(Money::MAX.to_string(), "9999999999.99");
        assert_eq!(Money::MAX.cents(), Some(MAX_MONEY_CENTS));
        assert_eq!(Money::from_cents(i64::MAX), Money::MAX);
        assert_eq!(Money::from_decimal(dec("9999999999.99")).ok(), Some(Money::MAX));
        assert!(Money::from_decimal(dec("9999999999.995")).is_err());
        assert!(Money::from_decimal(Decimal::MAX / Decimal::TEN).is_err());
    }

    #[test]
    fn money_rejects_negative() {
        assert!(Money::from_decimal(dec("-0.01")).is_err());
        assert_eq!(Money::from_cents(-5), Money::ZERO);
    }

    #[test]
    fn money_cents() {
        assert_eq!(Money::from_cents(1999).cents(), Some(1999));
    }

    #[test]
    fn markup_default_is_ten_percent() {
        assert_eq!(MarkupPercentage::default().value(), dec("10.00"));
    }

    #[test]
    fn markup_validation() {
        assert!(MarkupPercentage::new(dec("7.5")).is_ok());
        assert!(MarkupPercentage::new(dec("0")).is_ok());
        assert!(MarkupPercentage::new(dec("-1")).is_err());
        assert!(MarkupPercentage::new(dec("1000")).is_err());
        assert!(MarkupPercentage::new(dec("1.005")).is_err());
    }

    #[test]
    fn actor_permissions() {
        let owner = UserId::new();
        assert!(Actor::user(owner).may_act_for(owner));
        assert!(!Actor::user(UserId::new()).may_act_for(owner));
        assert!(Actor::staff(UserId::new()).may_act_for(owner));
    }

    #[test]
    fn ids_serialize_as_plain_uuid() {
        let id = DropId::new();
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, format!("\"{id}\""));
    }
}
