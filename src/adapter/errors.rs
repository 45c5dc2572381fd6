//! # Adapter Errors
//!
//! [`AdapterError`] is the single error type surfaced by adapter operations.
//! Store failures carry the operation and the statement or item involved;
//! the adapter never retries a store call itself.

use thiserror::Error;

use crate::consistency::{ConsistencyError, ConsistencyErrorCode};
use crate::record::RecordError;
use crate::selection::SelectionError;
use crate::store::StoreError;
use crate::where_expr::CompileError;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Malformed configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

/// Adapter errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error(transparent)]
    UnrecognizedNode(#[from] CompileError),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("{operation}: consistency not confirmed: {source}")]
    ConsistencyTimeout {
        operation: &'static str,
        #[source]
        source: ConsistencyError,
    },

    #[error("Store call failed during {operation} ({query}): {source}")]
    Store {
        operation: &'static str,
        query: String,
        #[source]
        source: StoreError,
    },

    #[error("Record error during {operation}: {source}")]
    Record {
        operation: &'static str,
        #[source]
        source: RecordError,
    },
}

impl AdapterError {
    pub(crate) fn store(operation: &'static str, query: impl Into<String>, source: StoreError) -> Self {
        AdapterError::Store {
            operation,
            query: query.into(),
            source,
        }
    }

    pub(crate) fn record(operation: &'static str, source: RecordError) -> Self {
        AdapterError::Record { operation, source }
    }

    pub(crate) fn from_selection(operation: &'static str, error: SelectionError) -> Self {
        match error {
            SelectionError::Store { statement, source } => Self::store(operation, statement, source),
            SelectionError::Decode { source, .. } => Self::record(operation, source),
            SelectionError::MalformedCount(message) => {
                Self::store(operation, "count(*)", StoreError::Internal(message))
            }
        }
    }

    pub(crate) fn from_consistency(operation: &'static str, error: ConsistencyError) -> Self {
        match error.code() {
            ConsistencyErrorCode::SdbConfigurationInvalid => {
                AdapterError::Configuration(ConfigError::Consistency(error))
            }
            ConsistencyErrorCode::SdbConsistencyTimeout
            | ConsistencyErrorCode::SdbConsistencyStoreFailed => AdapterError::ConsistencyTimeout {
                operation,
                source: error,
            },
        }
    }

    /// Returns true for operational failures worth retrying, as opposed to
    /// programmer or configuration errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Store { source, .. } => source.is_transient(),
            AdapterError::ConsistencyTimeout { .. } => true,
            _ => false,
        }
    }
}
