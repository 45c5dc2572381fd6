//! Adapter configuration
//!
//! Loaded from JSON. Credentials accept the aliases `user` and `password`;
//! the domain may be given directly or as a `path` with surrounding slashes.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use crate::consistency::{BackoffConfig, ConsistencyPolicy};
use crate::observability::Severity;
use crate::store::DEFAULT_BATCH_CEILING;

/// Adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default, alias = "user")]
    pub access_key: Option<String>,

    #[serde(default, alias = "password")]
    pub secret_key: Option<String>,

    /// Store endpoint host (default: "sdb.amazonaws.com")
    #[serde(default = "default_host")]
    pub host: String,

    /// Store endpoint port; unset means 443
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub domain: Option<String>,

    /// Alternative to `domain`; leading and trailing slashes are stripped
    #[serde(default)]
    pub path: Option<String>,

    /// Create the domain at startup if it does not exist (default: false)
    #[serde(default)]
    pub create_domain: bool,

    /// Discard every store call (default: false)
    #[serde(default, alias = "null")]
    pub null_mode: bool,

    #[serde(default)]
    pub wait_for_consistency: ConsistencyPolicy,

    /// Items requested per select call (default: 2500)
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    #[serde(default)]
    pub consistency: BackoffConfig,

    /// Minimum log severity; unset leaves the process-wide setting alone
    #[serde(default)]
    pub log_level: Option<Severity>,
}

fn default_host() -> String {
    "sdb.amazonaws.com".to_string()
}

fn default_batch_limit() -> usize {
    DEFAULT_BATCH_CEILING
}

fn default_port() -> u16 {
    443
}

fn domain_pattern() -> &'static Regex {
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    DOMAIN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,255}$").expect("domain pattern is valid"))
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            host: default_host(),
            port: None,
            domain: None,
            path: None,
            create_domain: false,
            null_mode: false,
            wait_for_consistency: ConsistencyPolicy::default(),
            batch_limit: default_batch_limit(),
            consistency: BackoffConfig::default(),
            log_level: None,
        }
    }
}

impl AdapterConfig {
    /// Create a config targeting one domain, everything else default
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: AdapterConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(default_port)
    }

    /// Store endpoint as `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }

    /// The domain name, from `domain` or else from `path`
    pub fn domain_name(&self) -> Option<String> {
        match (&self.domain, &self.path) {
            (Some(domain), _) => Some(domain.clone()),
            (None, Some(path)) => Some(path.trim_matches('/').to_string()),
            (None, None) => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let domain = self.domain_name().ok_or_else(|| ConfigError::Invalid {
            field: "domain",
            message: "either domain or path must be set".to_string(),
        })?;
        if !domain_pattern().is_match(&domain) {
            return Err(ConfigError::Invalid {
                field: "domain",
                message: format!(
                    "{:?} must be 3 to 255 characters of letters, digits, '_', '-' or '.'",
                    domain
                ),
            });
        }
        if self.batch_limit == 0 || self.batch_limit > DEFAULT_BATCH_CEILING {
            return Err(ConfigError::Invalid {
                field: "batch_limit",
                message: format!("must be between 1 and {}", DEFAULT_BATCH_CEILING),
            });
        }
        self.consistency.validate()?;
        Ok(())
    }
}
