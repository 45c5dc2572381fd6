//! Consistency synchronizer
//!
//! After every mutation a fresh, time-ordered token is written to the
//! sentinel item. A strict read polls that item until the last written
//! token is visible.
//!
//! This assumes write visibility is linear: once the token written after
//! mutation N is visible, so is mutation N itself. The store does not
//! promise this; the synchronizer is a heuristic, not a guarantee.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use uuid::Uuid;

use super::backoff::{Backoff, BackoffConfig};
use super::errors::{ConsistencyError, ConsistencyResult};
use super::policy::ConsistencyPolicy;
use crate::observability::{AdapterMetrics, Logger, Timer};
use crate::record::AttributeMap;
use crate::store::{traced, StoreClient};

/// Item holding the consistency token
pub const TOKEN_ITEM: &str = "__dm_consistency_token";

/// Attribute holding the consistency token
pub const TOKEN_ATTR: &str = "__dm_consistency_token";

/// Owns the last written token for one adapter
#[derive(Debug)]
pub struct ConsistencySynchronizer {
    policy: ConsistencyPolicy,
    backoff: BackoffConfig,
    domain: String,
    last_token: Option<String>,
    /// Set once the last token has been seen; cleared by the next mutation
    observed: AtomicBool,
}

impl ConsistencySynchronizer {
    pub fn new(policy: ConsistencyPolicy, backoff: BackoffConfig, domain: impl Into<String>) -> Self {
        Self {
            policy,
            backoff,
            domain: domain.into(),
            last_token: None,
            observed: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> ConsistencyPolicy {
        self.policy
    }

    /// Replaces the policy; the last token is kept
    pub fn set_policy(&mut self, policy: ConsistencyPolicy) {
        self.policy = policy;
    }

    pub fn last_token(&self) -> Option<&str> {
        self.last_token.as_deref()
    }

    /// Records a completed mutation, writing a new token unless disabled
    pub fn record_mutation(&mut self, client: &dyn StoreClient) -> ConsistencyResult<()> {
        if !self.policy.writes_token() {
            return Ok(());
        }

        let token = Uuid::now_v7().to_string();
        let mut attributes = AttributeMap::new();
        attributes.insert(TOKEN_ATTR.to_string(), vec![token.clone()]);

        traced("PUT_ATTRIBUTES", TOKEN_ITEM, || {
            client.put_attributes(&self.domain, TOKEN_ITEM, &attributes, true)
        })
        .map_err(|e| ConsistencyError::store_failed("consistency token write failed", e))?;

        Logger::trace("CONSISTENCY_TOKEN_WRITTEN", &[("token", token.as_str())]);
        self.last_token = Some(token);
        self.observed.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Waits before a read when the policy requires it
    pub fn before_read(
        &self,
        client: &dyn StoreClient,
        metrics: &AdapterMetrics,
    ) -> ConsistencyResult<()> {
        if self.policy.blocks_reads() {
            self.wait(client, metrics)?;
        }
        Ok(())
    }

    /// Blocks until the last written token is visible.
    ///
    /// Returns the number of polls made; zero when there is nothing to wait
    /// for.
    pub fn wait(&self, client: &dyn StoreClient, metrics: &AdapterMetrics) -> ConsistencyResult<u32> {
        let Some(token) = self.last_token.as_deref() else {
            return Ok(0);
        };
        if self.observed.load(Ordering::Relaxed) {
            return Ok(0);
        }

        let timer = Timer::new();
        let mut backoff = Backoff::new(self.backoff.clone());
        let names = [TOKEN_ATTR.to_string()];

        loop {
            metrics.increment_consistency_polls();
            let attributes = traced("GET_ATTRIBUTES", TOKEN_ITEM, || {
                client.get_attributes(&self.domain, TOKEN_ITEM, &names)
            })
            .map_err(|e| ConsistencyError::store_failed("consistency token poll failed", e))?;

            let seen = attributes
                .get(TOKEN_ATTR)
                .map_or(false, |tokens| tokens.iter().any(|t| t == token));
            if seen {
                let polls = backoff.attempts() + 1;
                self.observed.store(true, Ordering::Relaxed);
                Logger::trace(
                    "CONSISTENCY_REACHED",
                    &[
                        ("elapsed_ms", timer.elapsed_ms().as_str()),
                        ("polls", polls.to_string().as_str()),
                    ],
                );
                return Ok(polls);
            }

            match backoff.next_delay() {
                Some(delay) => {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                None => {
                    metrics.increment_consistency_timeouts();
                    let elapsed = timer.elapsed_ms();
                    Logger::error(
                        "CONSISTENCY_TIMEOUT",
                        &[
                            ("elapsed_ms", elapsed.as_str()),
                            ("polls", backoff.attempts().to_string().as_str()),
                            ("token", token),
                        ],
                    );
                    return Err(ConsistencyError::timeout(token, backoff.attempts(), &elapsed));
                }
            }
        }
    }
}
