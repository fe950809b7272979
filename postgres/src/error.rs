//! Mapping from `sqlx` failures to [`StoreError`].

use drop_engine_core::error::{DropError, StoreError};

/// `serialization_failure`
const SERIALIZATION_FAILURE: &str = "40001";
/// `deadlock_detected`
const DEADLOCK_DETECTED: &str = "40P01";

/// Classifies a database error.
///
/// Serialization failures and deadlocks become [`StoreError::Conflict`] so the engine
/// can retry the whole unit of work. Everything else is [`StoreError::Database`].
pub(crate) fn store_error(context: &str, err: &sqlx::Error) -> DropError {
    if let sqlx::Error::Database(db_err) = err {
        if matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
        ) {
            metrics::counter!("drop_engine_store_conflicts_total", "backend" => "postgres")
                .increment(1);
            return StoreError::Conflict(format!("{context}: {err}")).into();
        }
    }
    StoreError::Database(format!("{context}: {err}")).into()
}

/// A column that could not be decoded into its domain type.
pub(crate) fn corrupt(context: &str, err: impl std::fmt::Display) -> DropError {
    StoreError::Corrupt(format!("{context}: {err}")).into()
}

/// Whether `err` is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
