//! # AppError
//!
//! Centralized error handling for the Verity ecosystem.
//! Plugins map their library errors into these variants at the boundary.

use thiserror::Error;

/// The primary error type for all vr-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Analysis, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty text, wrong file type)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Missing or forged identity token
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The external classifier failed or answered with something unusable
    #[error("classifier error: {0}")]
    Upstream(String),

    /// Infrastructure failure (e.g., DB down, migration failed)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Resource already exists or is in a conflicting state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded
    #[error("too many requests: {0}")]
    RateLimitExceeded(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }

    /// True for failures the caller can't fix by changing the request.
    pub fn is_server_side(&self) -> bool {
        matches!(self, AppError::Internal(_) | AppError::Upstream(_))
    }
}

/// A specialized Result type for Verity logic.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = AppError::not_found("analysis", "abc");
        assert_eq!(err.to_string(), "analysis not found with ID abc");
        assert!(!err.is_server_side());
    }
}
