//! # Store Errors

use thiserror::Error;

/// Result type for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a store client
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Invalid select expression: {0}")]
    InvalidExpression(String),

    #[error("No such domain: {0}")]
    NoSuchDomain(String),

    #[error("Invalid continuation token: {0}")]
    InvalidNextToken(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns true if repeating the call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
