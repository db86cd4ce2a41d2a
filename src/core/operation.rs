//! The operation contract and its terminal outcome type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier assigned to an operation when the queue starts it.
///
/// Allocated from a per-queue atomic counter; unique within a queue's
/// lifetime, not globally.
pub type OperationId = u64;

/// Terminal outcome of an operation (or of a whole queue run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The operation finished successfully.
    Success,
    /// The operation failed with a reason.
    Failure(String),
    /// The operation observed a cancellation request and stopped early.
    /// Cancellation is a distinct terminal state, not an error.
    Cancelled,
}

impl Outcome {
    /// Build a failure outcome from any displayable error.
    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self::Failure(error.to_string())
    }

    /// True if this outcome is [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// True if this outcome is [`Outcome::Failure`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// True if this outcome is [`Outcome::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// An asynchronous, cancellable unit of work that reports an [`Outcome`].
///
/// Implementations decide their own cancellation latency: `request_cancel`
/// only asks. A well-behaved operation checks its cancellation state at
/// suspension points and resolves with [`Outcome::Cancelled`] once it has
/// observed the request.
///
/// Queues are operations too: [`crate::core::OperationQueue`] implements
/// this trait, so a fully loaded queue can be scheduled inside another
/// queue like any leaf unit of work.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// Run the operation to completion and return its terminal outcome.
    ///
    /// Called at most once per scheduling by the owning queue.
    async fn run(&self) -> Outcome;

    /// Request best-effort cancellation.
    ///
    /// Must be safe to call from any thread, at any time, any number of
    /// times, including before `run` or after completion.
    fn request_cancel(&self);
}

/// Shared cancellation flag operations can embed to observe cancel requests.
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create a new, unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the flag as cancelled.
    pub fn set(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once `set` has been called on any clone of this flag.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
