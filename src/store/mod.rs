//! Store subsystem
//!
//! The [`StoreClient`] seam plus two in-process clients:
//! - [`NullStore`]: accepts and discards everything
//! - [`MemoryStore`]: an emulator with paging and delayed write visibility
//!
//! Store calls made by the selection engine and the adapter go through
//! [`traced`], which logs each call at TRACE with its argument and timing.

mod client;
mod dialect;
mod errors;
mod memory;
mod null;

pub use client::{Item, SelectPage, StoreClient};
pub use errors::{StoreError, StoreResult};
pub use memory::{MemoryStore, StoreCalls, DEFAULT_BATCH_CEILING, DEFAULT_PAGE_SIZE};
pub use null::NullStore;

use crate::observability::{Logger, Severity, Timer};

/// Runs one store call, logging its argument, outcome and elapsed time
pub fn traced<T>(call: &str, argument: &str, f: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
    if !Logger::enabled(Severity::Trace) {
        return f();
    }
    let timer = Timer::new();
    let result = f();
    let outcome = match &result {
        Ok(_) => "ok".to_string(),
        Err(e) => e.to_string(),
    };
    Logger::trace(
        call,
        &[
            ("argument", argument),
            ("elapsed_ms", timer.elapsed_ms().as_str()),
            ("outcome", outcome.as_str()),
        ],
    );
    result
}
