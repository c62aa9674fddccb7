//! Application error taxonomy and its mapping onto HTTP responses.
//!
//! Every handler returns `Result<_, ApiError>`; the conversion below is the
//! single place where status codes and the `{"error": "..."}` body shape are
//! decided.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request was well-formed but a field failed a business rule.
    #[error("{0}")]
    Validation(String),

    /// Missing or bad credentials, or an invalid/expired token.
    #[error("{0}")]
    Unauthenticated(String),

    /// The account is temporarily locked after too many failed logins.
    #[error("{0}")]
    AccountLocked(String),

    #[error("{0}")]
    NotFound(String),

    /// A uniqueness or dependency rule rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// The ledger guard rejected a write that would drive the balance negative.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Anything unexpected. The source is logged, never sent to the client.
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn account_locked(msg: impl Into<String>) -> Self {
        Self::AccountLocked(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InsufficientFunds => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::AccountLocked(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("resource not found"),
            err => {
                tracing::error!(error = %err, "unexpected database error");
                ApiError::Internal(err.into())
            }
        }
    }
}

/// Body shape shared by every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref source) = self {
            tracing::error!(error = ?source, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// True when the error is a Postgres unique violation (code 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().and_then(|db| db.code()),
        Some(code) if code == "23505"
    )
}

/// True when the error is a Postgres foreign key violation (code 23503).
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err.as_database_error().and_then(|db| db.code()),
        Some(code) if code == "23503"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::validation("bad input").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InsufficientFunds.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::unauthenticated("invalid credentials").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::account_locked("account locked").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::not_found("transaction not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::conflict("email already registered").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_their_source() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn error_body_serializes_under_the_error_key() {
        let body = ErrorBody {
            error: "insufficient funds".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "insufficient funds"}));
    }
}
