//! Failure policy seam.
//!
//! The queue never decides on its own what a failed operation means; it asks
//! the strategy it was constructed with, once per failure, synchronously,
//! before the next dequeue decision. Cancelled operations never reach the
//! strategy.

/// Queue-level effect of a single operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Keep scheduling; the failure does not affect the queue's aggregate
    /// outcome.
    Continue,
    /// Keep scheduling, but the queue's aggregate outcome becomes a failure.
    RecordAndContinue,
    /// Stop dequeuing new work; in-flight operations run to completion and
    /// the queue's aggregate outcome becomes a failure.
    Halt,
}

/// Decides how a failed operation affects the queue.
pub trait ErrorStrategy: Send + Sync {
    /// Judge a single operation failure.
    fn on_operation_failure(&self, error: &str) -> FailureDisposition;
}

/// Default policy: failures never stop the queue, but the aggregate outcome
/// reports them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFailures;

impl ErrorStrategy for RecordFailures {
    fn on_operation_failure(&self, _error: &str) -> FailureDisposition {
        FailureDisposition::RecordAndContinue
    }
}

/// Tolerant policy: failures are contained to their operation and the queue
/// can still finish successfully.
#[derive(Debug, Clone, Copy, Default)]
pub struct TolerateFailures;

impl ErrorStrategy for TolerateFailures {
    fn on_operation_failure(&self, _error: &str) -> FailureDisposition {
        FailureDisposition::Continue
    }
}

/// Strict policy: the first failure stops all further dequeuing.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaltOnFailure;

impl ErrorStrategy for HaltOnFailure {
    fn on_operation_failure(&self, _error: &str) -> FailureDisposition {
        FailureDisposition::Halt
    }
}
