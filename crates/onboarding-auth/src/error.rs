//! Error types for token handling
//!
//! This module defines the errors that can occur while parsing an API token
//! and resolving the tenant it belongs to.

use thiserror::Error;

/// Token error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is malformed or empty
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token is missing a claim needed to resolve the tenant
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// Resolved tenant URL is unusable
    #[error("Invalid tenant URL: {0}")]
    InvalidTenantUrl(String),
}

/// Result type for token operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Get the HTTP status code the platform would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::TokenExpired | AuthError::InvalidToken(_) => 401,
            AuthError::MissingClaim(_) | AuthError::InvalidTenantUrl(_) => 400,
        }
    }

    /// Get a stable error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::MissingClaim(_) => "MISSING_CLAIM",
            AuthError::InvalidTenantUrl(_) => "INVALID_TENANT_URL",
        }
    }
}
