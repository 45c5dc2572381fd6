//! Consistency policy
//!
//! Accepted configuration values:
//! - `false` or `"disabled"`: no tokens, no waiting
//! - `"manual"`: write a token after each mutation, never block
//! - `"automatic"`: write a token and block the next read until it is seen
//!
//! Anything else is rejected when the configuration is loaded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ConsistencyError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "Value")]
pub enum ConsistencyPolicy {
    #[default]
    Disabled,
    Manual,
    Automatic,
}

impl ConsistencyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyPolicy::Disabled => "disabled",
            ConsistencyPolicy::Manual => "manual",
            ConsistencyPolicy::Automatic => "automatic",
        }
    }

    /// Returns true if mutations write a consistency token
    pub fn writes_token(&self) -> bool {
        !matches!(self, ConsistencyPolicy::Disabled)
    }

    /// Returns true if reads wait for the last token
    pub fn blocks_reads(&self) -> bool {
        matches!(self, ConsistencyPolicy::Automatic)
    }
}

impl fmt::Display for ConsistencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConsistencyPolicy {
    type Err = ConsistencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" | "false" => Ok(ConsistencyPolicy::Disabled),
            "manual" => Ok(ConsistencyPolicy::Manual),
            "automatic" => Ok(ConsistencyPolicy::Automatic),
            other => Err(ConsistencyError::invalid_policy(format!("{:?}", other))),
        }
    }
}

impl TryFrom<Value> for ConsistencyPolicy {
    type Error = ConsistencyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(false) => Ok(ConsistencyPolicy::Disabled),
            Value::String(s) => s.parse(),
            other => Err(ConsistencyError::invalid_policy(other)),
        }
    }
}
