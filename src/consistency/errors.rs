//! Consistency error types
//!
//! Error codes:
//! - SDB_CONFIGURATION_INVALID (REJECT)
//! - SDB_CONSISTENCY_TIMEOUT (ERROR)
//! - SDB_CONSISTENCY_STORE_FAILED (ERROR)
//!
//! A timeout or store failure after a mutation does not undo the mutation:
//! the data is written, only its visibility is unconfirmed.

use std::fmt;

use crate::store::StoreError;

/// Severity levels for consistency errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Rejected at construction, nothing was attempted
    Reject,
    /// Operation failed, the adapter remains usable
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Consistency error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyErrorCode {
    /// Unknown policy value
    SdbConfigurationInvalid,
    /// Bounded poll exhausted before the token was observed
    SdbConsistencyTimeout,
    /// Token write or poll failed at the store
    SdbConsistencyStoreFailed,
}

impl ConsistencyErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ConsistencyErrorCode::SdbConfigurationInvalid => "SDB_CONFIGURATION_INVALID",
            ConsistencyErrorCode::SdbConsistencyTimeout => "SDB_CONSISTENCY_TIMEOUT",
            ConsistencyErrorCode::SdbConsistencyStoreFailed => "SDB_CONSISTENCY_STORE_FAILED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ConsistencyErrorCode::SdbConfigurationInvalid => Severity::Reject,
            ConsistencyErrorCode::SdbConsistencyTimeout => Severity::Error,
            ConsistencyErrorCode::SdbConsistencyStoreFailed => Severity::Error,
        }
    }
}

impl fmt::Display for ConsistencyErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Consistency error with context
#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyError {
    code: ConsistencyErrorCode,
    message: String,
    details: Option<String>,
    source: Option<StoreError>,
}

impl ConsistencyError {
    /// Create an invalid policy error
    pub fn invalid_policy(value: impl fmt::Display) -> Self {
        Self {
            code: ConsistencyErrorCode::SdbConfigurationInvalid,
            message: format!("invalid wait_for_consistency option: {}", value),
            details: None,
            source: None,
        }
    }

    /// Create an invalid backoff setting error
    pub fn invalid_backoff(reason: impl Into<String>) -> Self {
        Self {
            code: ConsistencyErrorCode::SdbConfigurationInvalid,
            message: reason.into(),
            details: None,
            source: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(token: &str, attempts: u32, elapsed_ms: &str) -> Self {
        Self {
            code: ConsistencyErrorCode::SdbConsistencyTimeout,
            message: format!("consistency token not observed after {} polls", attempts),
            details: Some(format!("token: {}, elapsed_ms: {}", token, elapsed_ms)),
            source: None,
        }
    }

    /// Create a store failure error
    pub fn store_failed(message: impl Into<String>, source: StoreError) -> Self {
        Self {
            code: ConsistencyErrorCode::SdbConsistencyStoreFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    pub fn code(&self) -> ConsistencyErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ConsistencyErrorCode::SdbConsistencyTimeout
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConsistencyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for consistency operations
pub type ConsistencyResult<T> = Result<T, ConsistencyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_codes_and_severity() {
        let err = ConsistencyError::invalid_policy("\"eventually\"");
        assert_eq!(err.code().code(), "SDB_CONFIGURATION_INVALID");
        assert_eq!(err.severity(), Severity::Reject);

        let err = ConsistencyError::timeout("abc", 5, "12.000");
        assert!(err.is_timeout());
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_display_includes_details_and_cause() {
        let err = ConsistencyError::timeout("abc", 5, "12.000");
        let display = err.to_string();
        assert!(display.starts_with("[ERROR] SDB_CONSISTENCY_TIMEOUT"));
        assert!(display.contains("token: abc"));

        let err = ConsistencyError::store_failed(
            "token write failed",
            StoreError::Unavailable("throttled".into()),
        );
        assert!(err.to_string().contains("caused by"));
        assert!(err.source().is_some());
    }
}
