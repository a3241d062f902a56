//! Error types for Bailiff infrastructure
//!
//! These cover everything outside the authorization taxonomy: storage,
//! configuration, malformed request bodies. Gate rejections live in
//! [`crate::auth::AuthError`].

use hyper::StatusCode;

/// Main error type for Bailiff operations
#[derive(Debug, thiserror::Error)]
pub enum BailiffError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BailiffError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to an HTTP caller.
    ///
    /// Server-side failures are reduced to a generic line; the detail goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Config(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for BailiffError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for BailiffError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for BailiffError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for BailiffError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encoding failed: {}", err))
    }
}

/// Result type alias for Bailiff operations
pub type Result<T> = std::result::Result<T, BailiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BailiffError::Database("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            BailiffError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BailiffError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_public_message_hides_storage_detail() {
        let err = BailiffError::Database("connection refused to 10.0.0.4".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = BailiffError::BadRequest("missing field".into());
        assert!(err.public_message().contains("missing field"));

        let err = BailiffError::NotFound("Plan not found".into());
        assert_eq!(err.public_message(), "Plan not found");
        let err = BailiffError::Conflict("Email already registered".into());
        assert_eq!(err.public_message(), "Email already registered");
    }
}
