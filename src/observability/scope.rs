//! Transaction scopes
//!
//! A transaction here is a named logging and timing scope around one adapter
//! operation. It groups the store calls of that operation in the log; it
//! does not make them atomic.

use std::cell::Cell;
use std::time::Instant;

use super::logger::Logger;

/// Logs the lifecycle of one adapter operation
///
/// - `{name}_BEGIN` on creation
/// - `{name}_COMPLETE` with `elapsed_ms` on [`complete`](Self::complete)
/// - `{name}_FAILED` with the reason on [`fail`](Self::fail)
/// - `{name}_INCOMPLETE` if dropped without either
pub struct TransactionScope {
    name: &'static str,
    timer: Timer,
    finished: Cell<bool>,
}

impl TransactionScope {
    pub fn open(name: &'static str) -> Self {
        Logger::info(&format!("{}_BEGIN", name), &[]);
        Self {
            name,
            timer: Timer::new(),
            finished: Cell::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Logs completion with the elapsed time and extra fields
    pub fn complete(self, fields: &[(&str, &str)]) {
        self.finished.set(true);
        let elapsed = self.timer.elapsed_ms();
        let mut all = vec![("elapsed_ms", elapsed.as_str())];
        all.extend(fields.iter().copied());
        Logger::info(&format!("{}_COMPLETE", self.name), &all);
    }

    pub fn fail(self, reason: &str) {
        self.finished.set(true);
        let elapsed = self.timer.elapsed_ms();
        Logger::error(
            &format!("{}_FAILED", self.name),
            &[("elapsed_ms", elapsed.as_str()), ("reason", reason)],
        );
    }

    /// Closes the scope according to an operation's outcome
    pub fn finish<T, E: std::fmt::Display>(self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.complete(&[]),
            Err(e) => self.fail(&e.to_string()),
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if !self.finished.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// Wall-clock timer for log fields
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds, formatted for a log field
    pub fn elapsed_ms(&self) -> String {
        format!("{:.3}", self.start.elapsed().as_secs_f64() * 1000.0)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
