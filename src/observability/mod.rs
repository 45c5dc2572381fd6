//! Observability subsystem
//!
//! - Structured JSON logging with a process-wide minimum severity
//! - Transaction scopes around adapter operations
//! - Per-adapter counters
//!
//! Observability is read-only: nothing here changes the outcome of the
//! operation being observed, and write failures on the log sink are ignored.
//!
//! ```ignore
//! use sdb_adapter::observability::{Logger, TransactionScope};
//!
//! Logger::info("ADAPTER_READY", &[("domain", "posts")]);
//!
//! let scope = TransactionScope::open("READ");
//! // ... store calls ...
//! scope.complete(&[("records", "3")]);
//! ```

mod logger;
mod metrics;
mod scope;

pub use logger::{Logger, Severity};
pub use metrics::{AdapterMetrics, MetricsSnapshot};
pub use scope::{Timer, TransactionScope};
