// Domain error taxonomy, surfaced over HTTP with appropriate status codes
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors crossing a component boundary. Storage-layer failures are wrapped
/// into these kinds at the boundary and never escape as raw sqlx errors.
#[derive(Debug, Error)]
pub enum CoreError {
    // 401 - no valid credential
    #[error("{0}")]
    Unauthenticated(String),

    // 403 - valid credential, insufficient role. Only the admin-surface
    // boundary produces this; cross-tenant access attempts yield NotFound.
    #[error("{0}")]
    Forbidden(String),

    // 404 - absent, or belongs to a different tenant (indistinguishable)
    #[error("{0}")]
    NotFound(String),

    // 400 - e.g. self-deletion, malformed role value, reserved record name
    #[error("{0}")]
    InvalidOperation(String),

    // 409 - duplicate registration
    #[error("{0}")]
    Conflict(String),

    // 503 - partition setup failed; safe to retry on next access
    #[error("provisioning failed: {0}")]
    Provision(String),

    // 503 - storage timeout / connectivity
    #[error("{0}")]
    Unavailable(String),

    // 500
    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Provision(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Unauthenticated(_) => "UNAUTHENTICATED",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::InvalidOperation(_) => "INVALID_OPERATION",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Provision(_) => "PROVISION_ERROR",
            CoreError::Unavailable(_) => "UNAVAILABLE",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.to_string(),
            "code": self.error_code(),
        })
    }
}

// Static constructor methods
impl CoreError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        CoreError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        CoreError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        CoreError::InvalidOperation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict(message.into())
    }

    pub fn provision(message: impl Into<String>) -> Self {
        CoreError::Provision(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        CoreError::Unavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }
}

/// Postgres "statement_timeout exceeded"
const PG_QUERY_CANCELED: &str = "57014";
/// Postgres unique-constraint violation
pub const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => CoreError::not_found("record not found"),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                tracing::warn!("database unavailable: {}", err);
                CoreError::unavailable("database temporarily unavailable")
            }
            sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_QUERY_CANCELED) => {
                tracing::warn!("statement timed out: {}", err);
                CoreError::unavailable("database operation timed out")
            }
            _ => {
                // Log the real error but return a generic message
                tracing::error!("sqlx error: {}", err);
                CoreError::internal("an error occurred while processing your request")
            }
        }
    }
}

/// True when the error is a unique violation, used to turn duplicate inserts
/// into benign conflicts (idempotent provisioning, duplicate registration).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION))
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for CoreError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
