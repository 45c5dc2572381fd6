//! Compiler error types
//!
//! Error codes:
//! - SDB_UNRECOGNIZED_NODE (REJECT)
//!
//! Compilation errors are programmer errors: the caller built a condition
//! tree the compiler cannot interpret. They are never retried.

use std::fmt;

/// Severity levels for compiler errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Query rejected before reaching the store
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Compiler error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorCode {
    /// Node shape the compiler does not know how to render
    SdbUnrecognizedNode,
}

impl CompileErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorCode::SdbUnrecognizedNode => "SDB_UNRECOGNIZED_NODE",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Compiler error with the offending node
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    code: CompileErrorCode,
    message: String,
    node: String,
}

impl CompileError {
    /// Create an unrecognized node error
    pub fn unrecognized_node(reason: impl Into<String>, node: impl fmt::Display) -> Self {
        Self {
            code: CompileErrorCode::SdbUnrecognizedNode,
            message: reason.into(),
            node: node.to_string(),
        }
    }

    pub fn code(&self) -> CompileErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the rendered offending node
    pub fn node(&self) -> &str {
        &self.node
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} (node: {})",
            self.code.severity(),
            self.code.code(),
            self.message,
            self.node
        )
    }
}

impl std::error::Error for CompileError {}

/// Result type for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;
