//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific TUI or GUI implementation.

use crate::pipeline::Stage;

/// Sink for user-facing progress of an install.
pub trait Reporter: Send + Sync {
    /// Indicates a new section has started (e.g. "Installing vi-mongo v0.1.29").
    fn section(&self, title: &str);

    /// The pipeline entered `stage`; `detail` says what it is working on.
    fn stage(&self, stage: Stage, detail: &str);

    /// Updates the progress of a download.
    fn downloading(&self, current: u64, total: Option<u64>);

    /// A transient fetch failure is about to be retried.
    fn retrying(&self, attempt: u32, max_attempts: u32, reason: &str);

    /// The pipeline stopped in `stage` for `reason`.
    fn failed(&self, stage: Stage, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn stage(&self, stage: Stage, detail: &str) {
        (**self).stage(stage, detail);
    }
    fn downloading(&self, current: u64, total: Option<u64>) {
        (**self).downloading(current, total);
    }
    fn retrying(&self, attempt: u32, max_attempts: u32, reason: &str) {
        (**self).retrying(attempt, max_attempts, reason);
    }
    fn failed(&self, stage: Stage, reason: &str) {
        (**self).failed(stage, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn stage(&self, _: Stage, _: &str) {}
    fn downloading(&self, _: u64, _: Option<u64>) {}
    fn retrying(&self, _: u32, _: u32, _: &str) {}
    fn failed(&self, _: Stage, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
