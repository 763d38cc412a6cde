//! Error types for the restaurant directory

use thiserror::Error;

use crate::types::{ApiError, ValidationErrors};

/// Directory error types
#[derive(Error, Debug)]
pub enum Error {
    // Authentication Errors
    #[error("Authentication credentials were not provided")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    // Authorization Errors
    #[error("You do not have permission to perform this action")]
    Forbidden,

    // Lookup Errors
    #[error("Not found")]
    ResourceNotFound,

    // Write Errors
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Cannot delete {0}: it is still referenced")]
    ProtectedReference(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    // General Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for directory operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

/// HTTP status code for each error type
impl Error {
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::MalformedPayload(_) | Self::Validation(_) => 400,

            // 401 Unauthorized
            Self::Unauthorized | Self::InvalidToken | Self::TokenExpired => 401,

            // 403 Forbidden
            Self::Forbidden => 403,

            // 404 Not Found
            Self::ResourceNotFound => 404,

            // 409 Conflict
            Self::ProtectedReference(_) | Self::DuplicateKey(_) => 409,

            // 500 Internal Server Error
            Self::ConfigError(_) | Self::InternalError(_) => 500,
        }
    }

    /// Error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "not_authenticated",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::Forbidden => "permission_denied",
            Self::ResourceNotFound => "not_found",
            Self::MalformedPayload(_) => "parse_error",
            Self::Validation(_) => "validation_error",
            Self::ProtectedReference(_) => "protected_reference",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::ConfigError(_) => "config_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Whether the error means the caller must (re)authenticate
    pub fn is_authentication_failure(&self) -> bool {
        self.status_code() == 401
    }

    /// Structured response body for this error
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::Validation(errors) => ApiError::new(self.error_code(), "Invalid input.")
                .with_details(errors.to_json()),
            // store failures are logged by the caller, not echoed to clients
            Self::ConfigError(_) | Self::InternalError(_) => {
                ApiError::new("internal_error", "A server error occurred.")
            }
            _ => ApiError::new(self.error_code(), self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::Unauthorized.status_code(), 401);
        assert_eq!(Error::InvalidToken.status_code(), 401);
        assert_eq!(Error::Forbidden.status_code(), 403);
        assert_eq!(Error::ResourceNotFound.status_code(), 404);
        assert_eq!(
            Error::MalformedPayload("EOF".to_string()).status_code(),
            400
        );
        assert_eq!(
            Error::Validation(ValidationErrors::new()).status_code(),
            400
        );
        assert_eq!(
            Error::ProtectedReference("district".to_string()).status_code(),
            409
        );
        assert_eq!(Error::InternalError("boom".to_string()).status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Unauthorized.error_code(), "not_authenticated");
        assert_eq!(Error::Forbidden.error_code(), "permission_denied");
        assert_eq!(
            Error::ProtectedReference("district".to_string()).error_code(),
            "protected_reference"
        );
    }

    #[test]
    fn test_authentication_failures_are_distinct_from_forbidden() {
        assert!(Error::Unauthorized.is_authentication_failure());
        assert!(Error::TokenExpired.is_authentication_failure());
        assert!(!Error::Forbidden.is_authentication_failure());
    }

    #[test]
    fn test_validation_body_carries_field_details() {
        let mut errors = ValidationErrors::new();
        errors.add("price_tier", "price_tier must be between 1 and 4");
        let body = Error::from(errors).to_api_error();
        assert_eq!(body.code, "validation_error");
        let details = body.details.unwrap();
        assert_eq!(
            details["price_tier"][0],
            "price_tier must be between 1 and 4"
        );
    }

    #[test]
    fn test_internal_error_message_is_generic() {
        let body = Error::InternalError("lock poisoned".to_string()).to_api_error();
        assert_eq!(body.code, "internal_error");
        assert!(!body.message.contains("lock"));
    }
}
