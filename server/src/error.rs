//! API error taxonomy
//!
//! Every failure surfaced to a caller carries a stable wire code plus a
//! human-readable message. Business-rule violations are terminal; transient
//! store errors are retried by the transaction runner (see `db`) and only
//! surfaced as `Unavailable` once the attempt budget is exhausted.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Wire-level error body: `{ "error": "...", "code": "failed-precondition" }`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// No caller identity (missing/expired/tampered token)
    #[error("{0}")]
    Unauthenticated(String),

    /// Malformed input shape or out-of-range value, rejected at the boundary
    #[error("{0}")]
    InvalidArgument(String),

    /// Role or ownership violation
    #[error("{0}")]
    PermissionDenied(String),

    /// Business-rule violation: insufficient credits, already claimed,
    /// exclusivity conflict. Deterministic given current state; never retried.
    #[error("{0}")]
    FailedPrecondition(String),

    /// Referenced job or account absent
    #[error("{0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("{0}")]
    ResourceExhausted(String),

    /// Transient store contention that outlived the retry budget; the caller
    /// may safely retry the whole call (idempotency markers make it safe).
    #[error("{0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("store error: {0}")]
    Store(#[from] diesel::result::Error),
}

impl ApiError {
    /// Stable wire code, mirroring the status mapping the mobile clients
    /// already depend on.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::InvalidArgument(_) => "invalid-argument",
            ApiError::PermissionDenied(_) => "permission-denied",
            ApiError::FailedPrecondition(_) => "failed-precondition",
            ApiError::NotFound(_) => "not-found",
            ApiError::ResourceExhausted(_) => "resource-exhausted",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) | ApiError::Store(_) => "internal",
        }
    }

    /// True for errors that a retry of the same call might clear.
    ///
    /// SQLite reports writer contention as `database is locked` / `busy`;
    /// those are the only store errors worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Unavailable(_) => true,
            ApiError::Store(diesel::result::Error::DatabaseError(_, info)) => {
                let msg = info.message();
                msg.contains("locked") || msg.contains("busy")
            }
            _ => false,
        }
    }

    fn public_message(&self) -> String {
        match self {
            // Never leak store/internal error text to callers.
            ApiError::Internal(_) | ApiError::Store(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::FailedPrecondition(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, ApiError::Internal(_) | ApiError::Store(_)) {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.public_message(),
            code: self.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Unauthenticated("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::FailedPrecondition("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::PermissionDenied("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::ResourceExhausted("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Unavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_errors_are_redacted() {
        let err = ApiError::Internal(anyhow::anyhow!("secret connection string"));
        assert_eq!(err.public_message(), "Internal error");
        assert_eq!(err.code(), "internal");
    }

    #[test]
    fn test_locked_store_error_is_transient() {
        let err = ApiError::Store(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::Unknown,
            Box::new("database is locked".to_string()),
        ));
        assert!(err.is_transient());

        let err = ApiError::FailedPrecondition("Not enough credits".into());
        assert!(!err.is_transient());
    }
}
