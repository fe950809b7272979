//! Drop lifecycle: `upcoming → active → {sold_out | ended}`.
//!
//! Status is derived lazily from the clock and the sold/total counters every time a drop is
//! read or purchased from; there is no scheduler. The stored status only records the
//! furthest point a drop has reached so that a derivation can never move it backwards.

use crate::drops::Drop;
use crate::error::{DropError, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStatus {
    /// Before `start_time`
    Upcoming,
    /// Inside the window with stock remaining
    Active,
    /// Every unit sold; sticky regardless of time
    SoldOut,
    /// Window closed before selling out
    Ended,
}

impl DropStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::SoldOut => "sold_out",
            Self::Ended => "ended",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "sold_out" => Ok(Self::SoldOut),
            "ended" => Ok(Self::Ended),
            _ => Err(StoreError::Corrupt(format!("Invalid drop status: {s}"))),
        }
    }

    /// `sold_out` and `ended` never change back.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::SoldOut | Self::Ended)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Upcoming => 0,
            Self::Active => 1,
            Self::Ended => 2,
            Self::SoldOut => 3,
        }
    }
}

impl fmt::Display for DropStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure status derivation rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropLifecycle;

impl DropLifecycle {
    /// Status from time and stock alone, ignoring history.
    #[must_use]
    pub fn evaluate(
        now: DateTime<Utc>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        sold_quantity: u32,
        quantity: u32,
    ) -> DropStatus {
        if sold_quantity >= quantity {
            DropStatus::SoldOut
        } else if now < start_time {
            DropStatus::Upcoming
        } else if now < end_time {
            DropStatus::Active
        } else {
            DropStatus::Ended
        }
    }

    /// Status of `drop` at `now`, never behind the status it has already reached.
    #[must_use]
    pub fn derive(drop: &Drop, now: DateTime<Utc>) -> DropStatus {
        let evaluated = Self::evaluate(
            now,
            drop.start_time,
            drop.end_time,
            drop.sold_quantity,
            drop.quantity,
        );
        if evaluated.rank() >= drop.status.rank() {
            evaluated
        } else {
            drop.status
        }
    }

    /// Moves the stored status forward to the derived one.
    ///
    /// Returns `true` when the stored status changed and should be persisted.
    pub fn advance(drop: &mut Drop, now: DateTime<Utc>) -> bool {
        let derived = Self::derive(drop, now);
        if derived == drop.status {
            return false;
        }
        tracing::debug!(
            drop_id = %drop.id,
            from = %drop.status,
            to = %derived,
            "Drop status advanced"
        );
        drop.status = derived;
        drop.updated_at = now;
        true
    }

    /// Fails unless the drop currently accepts purchases.
    ///
    /// # Errors
    ///
    /// Returns [`DropError::DropNotActive`] for `upcoming`, `sold_out`, and `ended` drops.
    pub fn ensure_accepting(drop: &Drop, now: DateTime<Utc>) -> Result<(), DropError> {
        match Self::derive(drop, now) {
            DropStatus::Active => Ok(()),
            status => Err(DropError::DropNotActive {
                drop_id: drop.id,
                status,
            }),
        }
    }
}
