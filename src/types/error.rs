//! Error types for Quire
//!
//! Every failure a handler can produce maps to exactly one variant, and each
//! variant carries a fixed HTTP status and machine-readable code.

use hyper::StatusCode;

/// Main error type for Quire operations
#[derive(Debug, thiserror::Error)]
pub enum QuireError {
    /// Malformed or missing input, bad stage names, size and role rules
    #[error("{0}")]
    Validation(String),

    /// A lifecycle rule refused the transition
    #[error("{0}")]
    Workflow(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate key or a competing decision already recorded
    #[error("{0}")]
    Conflict(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("File storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuireError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Workflow(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Mail(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Workflow(_) => "WORKFLOW",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Database(_) => "DB_ERROR",
            Self::Mail(_) => "MAIL_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the message carries server-side detail that must not reach clients
    pub fn is_server_side(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Message safe to return to a client
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Database unavailable, try again later".to_string(),
            Self::Mail(_) => "Mail could not be delivered".to_string(),
            Self::Storage(_) => "File storage failed".to_string(),
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn workflow(msg: impl Into<String>) -> Self {
        Self::Workflow(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for QuireError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for QuireError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid JSON: {}", err))
    }
}

impl From<mongodb::error::Error> for QuireError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for QuireError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Internal(format!("BSON encoding failed: {}", err))
    }
}

impl From<bson::de::Error> for QuireError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON decoding failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for QuireError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

impl From<multer::Error> for QuireError {
    fn from(err: multer::Error) -> Self {
        Self::Validation(format!("Invalid multipart body: {}", err))
    }
}

impl From<reqwest::Error> for QuireError {
    fn from(err: reqwest::Error) -> Self {
        Self::Mail(err.to_string())
    }
}

/// Result type alias for Quire operations
pub type Result<T> = std::result::Result<T, QuireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(QuireError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(QuireError::workflow("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(QuireError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(QuireError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(QuireError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            QuireError::Mail("smtp down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_server_side_messages_are_generic() {
        let err = QuireError::Database("connection refused at 10.0.0.3:27017".into());
        assert!(err.is_server_side());
        assert!(!err.public_message().contains("10.0.0.3"));

        let err = QuireError::workflow("Stage P1 must be submitted first");
        assert!(!err.is_server_side());
        assert_eq!(err.public_message(), "Stage P1 must be submitted first");
    }
}
