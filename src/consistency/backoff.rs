//! Exponential backoff for the consistency poll

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::{ConsistencyError, ConsistencyResult};

/// Poll bounds and delays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first unsuccessful poll (default: 10)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on any single delay (default: 1000)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between delays (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Polls before giving up (default: 30)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Randomize each delay within its upper half (default: true)
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_initial_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    30
}

fn default_jitter() -> bool {
    true
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffConfig {
    /// Polls `max_attempts` times without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            max_attempts,
            jitter: false,
        }
    }

    pub fn validate(&self) -> ConsistencyResult<()> {
        if self.max_attempts == 0 {
            return Err(ConsistencyError::invalid_backoff(
                "consistency.max_attempts must be at least 1",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConsistencyError::invalid_backoff(
                "consistency.multiplier must be a finite number >= 1.0",
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConsistencyError::invalid_backoff(
                "consistency.initial_delay_ms must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }
}

/// Delay schedule for one wait
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
    next_delay_ms: f64,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        let next_delay_ms = config.initial_delay_ms as f64;
        Self {
            config,
            attempts: 0,
            next_delay_ms,
        }
    }

    /// Polls made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records a poll and returns the delay before the next one, or `None`
    /// when the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.config.max_attempts {
            return None;
        }

        let ceiling = (self.next_delay_ms.min(self.config.max_delay_ms as f64)) as u64;
        self.next_delay_ms *= self.config.multiplier;

        let delay = if self.config.jitter && ceiling > 1 {
            rand::thread_rng().gen_range(ceiling / 2..=ceiling)
        } else {
            ceiling
        };
        Some(Duration::from_millis(delay))
    }
}
