//! Error types for web handlers.
//!
//! [`AppError`] is what every handler returns on failure. Engine errors convert into it
//! with their HTTP status; internal failures are logged and replaced by a generic message.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use drop_engine_core::error::{DropError, ErrorKind};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```
/// use drop_engine_web::AppError;
/// use axum::http::StatusCode;
///
/// let err = AppError::unauthorized("missing X-User-Id header");
/// assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying error, logged but never sent to the client.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            message,
        )
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<DropError> for AppError {
    fn from(err: DropError) -> Self {
        // Self-follow is a malformed request rather than a permission problem.
        if matches!(err, DropError::SelfFollow) {
            return Self::new(StatusCode::BAD_REQUEST, "SELF_FOLLOW", err.to_string());
        }
        match err.kind() {
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
            ErrorKind::Forbidden => Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string()),
            ErrorKind::DropNotActive => {
                Self::new(StatusCode::BAD_REQUEST, "DROP_NOT_ACTIVE", err.to_string())
            }
            ErrorKind::InsufficientStock => {
                Self::new(StatusCode::BAD_REQUEST, "INSUFFICIENT_STOCK", err.to_string())
            }
            ErrorKind::AlreadyFinal => {
                Self::new(StatusCode::BAD_REQUEST, "ALREADY_FINAL", err.to_string())
            }
            ErrorKind::Validation => Self::validation(err.to_string()),
            ErrorKind::Internal => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::new(err))
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "INVALID_BODY", rejection.body_text())
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drop_engine_core::error::StoreError;
    use drop_engine_core::lifecycle::DropStatus;
    use drop_engine_core::purchase::PurchaseStatus;
    use drop_engine_core::types::{DropId, PurchaseId};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn business_failures_are_bad_requests() {
        let drop_id = DropId::new();
        for err in [
            DropError::DropNotActive {
                drop_id,
                status: DropStatus::SoldOut,
            },
            DropError::InsufficientStock {
                drop_id,
                requested: 3,
                available: 1,
            },
            DropError::AlreadyFinal {
                purchase_id: PurchaseId::new(),
                status: PurchaseStatus::Completed,
            },
            DropError::SelfFollow,
        ] {
            assert_eq!(AppError::from(err).status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::from(DropError::not_found("drop", "x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(DropError::forbidden("not yours")).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(DropError::validation("quantity must be at least 1")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AppError::from(DropError::Store(StoreError::Database(
            "password authentication failed".into(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("password"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
