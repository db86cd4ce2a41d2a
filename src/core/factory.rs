//! Conversion of queued objects into runnable operations.

use std::sync::Arc;

use crate::core::Operation;

/// A value that can wait in the pending queue.
///
/// The default implementation has no self-conversion capability; objects that
/// know how to build their own operation override [`Self::create_operation`],
/// and that capability takes precedence over every registered factory.
pub trait QueuedObject: Send + Sync + 'static {
    /// Optionally build the operation for this object.
    ///
    /// Returning `None` defers to the queue's registered factories.
    fn create_operation(&self) -> Option<Arc<dyn Operation>> {
        None
    }
}

/// Converts a queued object into an operation, or declines.
///
/// Factories compose by priority-ordered first-match: the queue consults
/// them in registration order and uses the first non-`None` result. A
/// factory must not assume exclusivity and must have no observable side
/// effects beyond constructing the returned operation.
pub trait OperationFactory<P>: Send + Sync {
    /// Build an operation for `object`, or `None` when this factory does not
    /// recognize it.
    fn create_operation(&self, object: &P) -> Option<Arc<dyn Operation>>;
}

/// Closures are factories.
impl<P, F> OperationFactory<P> for F
where
    F: Fn(&P) -> Option<Arc<dyn Operation>> + Send + Sync,
{
    fn create_operation(&self, object: &P) -> Option<Arc<dyn Operation>> {
        self(object)
    }
}
