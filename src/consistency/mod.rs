//! Consistency subsystem
//!
//! Read-after-write on top of an eventually consistent store, by writing a
//! token after each mutation and polling for it before strict reads.
//!
//! # States
//!
//! - Disabled: no-op
//! - Manual: token written after each mutation, reads never block
//! - Automatic: token written, the next read blocks until it is visible

mod backoff;
mod errors;
mod policy;
mod synchronizer;

pub use backoff::{Backoff, BackoffConfig};
pub use errors::{ConsistencyError, ConsistencyErrorCode, ConsistencyResult};
pub use policy::ConsistencyPolicy;
pub use synchronizer::{ConsistencySynchronizer, TOKEN_ATTR, TOKEN_ITEM};
