//! # Record Errors

use thiserror::Error;

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Record codec errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("Unknown field '{field}' for model {model}")]
    UnknownField { model: String, field: String },

    #[error("Field '{field}' expects {kind}, got {value}")]
    InvalidValue {
        field: String,
        kind: &'static str,
        value: String,
    },

    #[error("Stored value for '{field}' is not a valid {kind}: {value}")]
    Corrupt {
        field: String,
        kind: &'static str,
        value: String,
    },

    #[error("Key field '{field}' of model {model} has no value")]
    MissingKey { model: String, field: String },

    #[error("Model {0} declares no key fields")]
    NoKey(String),
}

impl RecordError {
    /// Returns true if the error comes from data already in the store
    /// rather than from caller input.
    pub fn is_stored_data(&self) -> bool {
        matches!(self, RecordError::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = RecordError::InvalidValue {
            field: "age".into(),
            kind: "integer",
            value: "\"old\"".into(),
        };
        assert_eq!(err.to_string(), "Field 'age' expects integer, got \"old\"");
        assert!(!err.is_stored_data());
    }
}
