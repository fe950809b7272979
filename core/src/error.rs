//! Error taxonomy for the drop engine.
//!
//! Every variant of [`DropError`] is a recoverable, request-scoped outcome. Only
//! [`StoreError::Conflict`] is transient; business failures such as
//! [`DropError::InsufficientStock`] are legitimate answers and are never retried.

use crate::lifecycle::DropStatus;
use crate::purchase::PurchaseStatus;
use crate::types::{DropId, PurchaseId};
use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Write-write contention detected by the backend (serialization failure, deadlock).
    ///
    /// The whole unit of work was rolled back and may be retried.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Connection, query, or constraint failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A persisted row could not be mapped back into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Coarse classification of a [`DropError`], used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown drop, purchase, creator, or product.
    NotFound,
    /// Acting on someone else's purchase or profile, or following oneself.
    Forbidden,
    /// Purchase attempted outside the active window or after sellout.
    DropNotActive,
    /// Requested quantity exceeds remaining stock.
    InsufficientStock,
    /// Cancellation of a purchase that already reached a terminal status.
    AlreadyFinal,
    /// Non-positive quantity or otherwise malformed input.
    Validation,
    /// Storage or arithmetic failure; not caused by the request.
    Internal,
}

/// Errors returned by drop engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DropError {
    /// The referenced record does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of record (`drop`, `purchase`, `creator`, `product`)
        resource: &'static str,
        /// Identifier or handle that was looked up
        id: String,
    },

    /// The actor is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A user tried to follow their own creator profile.
    #[error("You cannot follow yourself")]
    SelfFollow,

    /// The drop's derived status is not `active`.
    #[error("Drop {drop_id} is not accepting purchases (status: {status})")]
    DropNotActive {
        /// Drop that rejected the purchase
        drop_id: DropId,
        /// Derived status at the time of the attempt
        status: DropStatus,
    },

    /// Not enough units remain to satisfy the whole request.
    #[error("Insufficient stock for drop {drop_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Drop that declined the reservation
        drop_id: DropId,
        /// Units requested
        requested: u32,
        /// Units remaining at the time of the check
        available: u32,
    },

    /// The purchase can no longer change status.
    #[error("Purchase {purchase_id} is already {status}")]
    AlreadyFinal {
        /// Purchase that was targeted
        purchase_id: PurchaseId,
        /// Its current, terminal status
        status: PurchaseStatus,
    },

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Price computation overflowed or produced an invalid amount.
    #[error("Pricing failed: {0}")]
    Pricing(String),

    /// Storage backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DropError {
    /// Shorthand for [`DropError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`DropError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`DropError::Forbidden`].
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden(_) | Self::SelfFollow => ErrorKind::Forbidden,
            Self::DropNotActive { .. } => ErrorKind::DropNotActive,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::AlreadyFinal { .. } => ErrorKind::AlreadyFinal,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Pricing(_) | Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failed unit of work may be attempted again unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(DropError::from(StoreError::Conflict("40001".into())).is_retryable());
        assert!(!DropError::from(StoreError::Database("down".into())).is_retryable());
        assert!(
            !DropError::InsufficientStock {
                drop_id: DropId::new(),
                requested: 2,
                available: 1,
            }
            .is_retryable()
        );
    }

    #[test]
    fn self_follow_is_forbidden_kind() {
        assert_eq!(DropError::SelfFollow.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn not_found_message() {
        let err = DropError::not_found("creator", "@nobody");
        assert_eq!(err.to_string(), "creator @nobody not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
