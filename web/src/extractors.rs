//! Custom Axum extractors.
//!
//! - [`AuthenticatedUser`]: the caller identity injected by the upstream auth layer
//! - [`CorrelationId`]: request correlation id, taken from the header or generated

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use drop_engine_core::types::{Actor, UserId};
use uuid::Uuid;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Role value granting staff rights.
pub const STAFF_ROLE: &str = "staff";

/// The authenticated caller.
///
/// Read from `X-User-Id` (a UUID) and `X-User-Role` (`staff` grants staff rights).
/// A missing or malformed id rejects the request with `401`.
///
/// # Example
///
/// ```ignore
/// async fn handler(user: AuthenticatedUser) -> String {
///     format!("Hello {}", user.0.user_id)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Actor);

impl AuthenticatedUser {
    /// The caller's user id.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.0.user_id
    }

    /// The caller as an engine actor.
    #[must_use]
    pub const fn actor(&self) -> Actor {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(UserId::from_uuid)
            .ok_or_else(|| AppError::unauthorized("Invalid X-User-Id header"))?;

        let is_staff = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(STAFF_ROLE));

        Ok(Self(Actor { user_id, is_staff }))
    }
}

/// Correlation ID for request tracing.
///
/// Uses the id stored by the correlation middleware when it is installed, otherwise the
/// `X-Correlation-ID` header, otherwise a fresh UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<CorrelationId>() {
            return Ok(*id);
        }
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn user_from(headers: &[(&str, &str)]) -> Result<AuthenticatedUser, AppError> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).expect("Valid request").into_parts();
        AuthenticatedUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_user_and_role() {
        let id = Uuid::new_v4();
        let user = user_from(&[(USER_ID_HEADER, &id.to_string())]).await.unwrap();
        assert_eq!(user.user_id(), UserId::from_uuid(id));
        assert!(!user.actor().is_staff);

        let staff = user_from(&[(USER_ID_HEADER, &id.to_string()), (USER_ROLE_HEADER, "Staff")])
            .await
            .unwrap();
        assert!(staff.actor().is_staff);
    }

    #[tokio::test]
    async fn missing_or_invalid_id_is_unauthorized() {
        let err = user_from(&[]).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = user_from(&[(USER_ID_HEADER, "not-a-uuid")]).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .expect("Valid request");

        let (mut parts, ()) = req.into_parts();
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }
}
