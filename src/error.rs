//! Error types for StackShare
//!
//! Structured errors via thiserror; anyhow is only used at the binary edge.
//! Every variant maps onto an HTTP status so handlers can return
//! `Result<T>` directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Main error type for StackShare operations
#[derive(Error, Debug)]
pub enum StackShareError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// Requested row does not exist (or is not visible to the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing session or acting on someone else's data
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed or out-of-range input
    #[error("{0}")]
    Validation(String),

    /// Uniqueness rule violated (e.g. second review on the same day)
    #[error("{0}")]
    Conflict(String),

    /// Object storage upload/removal failed
    #[error("Object storage error: {0}")]
    ObjectStorage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid identifier format
    #[error("Invalid id: {0}")]
    InvalidId(#[from] uuid::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for StackShare operations
pub type Result<T> = std::result::Result<T, StackShareError>;

impl From<libsql::Error> for StackShareError {
    fn from(err: libsql::Error) -> Self {
        StackShareError::Database(err.to_string())
    }
}

/// Convert anyhow::Error to StackShareError
impl From<anyhow::Error> for StackShareError {
    fn from(err: anyhow::Error) -> Self {
        StackShareError::Other(err.to_string())
    }
}

impl StackShareError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            StackShareError::Validation(_) | StackShareError::InvalidId(_) => {
                StatusCode::BAD_REQUEST
            }
            StackShareError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StackShareError::NotFound(_) => StatusCode::NOT_FOUND,
            StackShareError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether trying again could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StackShareError::Database(_)
                | StackShareError::ObjectStorage(_)
                | StackShareError::Io(_)
                | StackShareError::Http(_)
                | StackShareError::Other(_)
        )
    }
}

impl IntoResponse for StackShareError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(StackShareError::Database("locked".to_string()).is_transient());
        assert!(!StackShareError::NotFound("stack".to_string()).is_transient());
        assert!(!StackShareError::Validation("range".to_string()).is_transient());
        assert!(!StackShareError::Conflict("review".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = StackShareError::NotFound("stack abc".to_string());
        assert_eq!(err.to_string(), "Not found: stack abc");
    }

    #[test]
    fn test_error_conversion() {
        let uuid_err = uuid::Uuid::parse_str("invalid");
        assert!(uuid_err.is_err());

        let err: StackShareError = uuid_err.unwrap_err().into();
        assert!(matches!(err, StackShareError::InvalidId(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            StackShareError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            StackShareError::Conflict("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            StackShareError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = StackShareError::Database("disk I/O error".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
