//! Lifecycle notification fan-out.
//!
//! Listeners are notified synchronously, in registration order, from outside
//! the queue's state lock: a slow listener delays subsequent notifications
//! but cannot corrupt scheduling state.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::core::{OperationId, Outcome};
use crate::util::clock::now_ms;

/// Observer of queue and operation lifecycle events.
///
/// All callbacks default to no-ops; implement only what you need. The
/// `object` parameter is `None` for operations queued directly via
/// [`crate::core::OperationQueue::queue_operation`], which have no
/// originating queued object.
pub trait QueueListener<P>: Send + Sync {
    /// The queue transitioned from idle to processing.
    fn queue_started(&self) {}

    /// An operation was started, with the object it was converted from.
    fn operation_started(&self, _id: OperationId, _object: Option<&P>) {}

    /// An operation reported completion.
    fn operation_finished(&self, _id: OperationId, _object: Option<&P>, _outcome: &Outcome) {}

    /// The queue drained (or was cancelled) and returned to idle, with the
    /// aggregate outcome of the run.
    fn queue_finished(&self, _outcome: &Outcome) {}
}

/// A recorded lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// Queue start.
    QueueStarted {
        /// Timestamp milliseconds.
        at_ms: u128,
    },
    /// Per-operation start.
    OperationStarted {
        /// The started operation.
        id: OperationId,
        /// Timestamp milliseconds.
        at_ms: u128,
    },
    /// Per-operation completion.
    OperationFinished {
        /// The finished operation.
        id: OperationId,
        /// Its terminal outcome.
        outcome: Outcome,
        /// Timestamp milliseconds.
        at_ms: u128,
    },
    /// Queue-level completion.
    QueueFinished {
        /// Aggregate outcome of the run.
        outcome: Outcome,
        /// Timestamp milliseconds.
        at_ms: u128,
    },
}

/// In-memory recording listener for testing and dev.
///
/// Keeps a bounded buffer of events; the oldest events are discarded once
/// the buffer is full.
pub struct InMemoryEventLog {
    events: Mutex<VecDeque<QueueEvent>>,
    max_events: usize,
}

impl InMemoryEventLog {
    /// Create a new in-memory log with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().iter().cloned().collect()
    }

    fn record(&self, event: QueueEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

impl<P> QueueListener<P> for InMemoryEventLog {
    fn queue_started(&self) {
        self.record(QueueEvent::QueueStarted { at_ms: now_ms() });
    }

    fn operation_started(&self, id: OperationId, _object: Option<&P>) {
        self.record(QueueEvent::OperationStarted {
            id,
            at_ms: now_ms(),
        });
    }

    fn operation_finished(&self, id: OperationId, _object: Option<&P>, outcome: &Outcome) {
        self.record(QueueEvent::OperationFinished {
            id,
            outcome: outcome.clone(),
            at_ms: now_ms(),
        });
    }

    fn queue_finished(&self, outcome: &Outcome) {
        self.record(QueueEvent::QueueFinished {
            outcome: outcome.clone(),
            at_ms: now_ms(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_records_in_order() {
        let log = InMemoryEventLog::new(16);
        QueueListener::<()>::queue_started(&log);
        QueueListener::<()>::operation_started(&log, 1, None);
        QueueListener::<()>::operation_finished(&log, 1, None, &Outcome::Success);
        QueueListener::<()>::queue_finished(&log, &Outcome::Success);

        let events = log.events();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], QueueEvent::QueueStarted { .. }));
        assert!(matches!(events[1], QueueEvent::OperationStarted { id: 1, .. }));
        assert!(matches!(
            events[3],
            QueueEvent::QueueFinished {
                outcome: Outcome::Success,
                ..
            }
        ));
    }

    #[test]
    fn event_log_buffer_is_bounded() {
        let log = InMemoryEventLog::new(2);
        for id in 0..5 {
            QueueListener::<()>::operation_started(&log, id, None);
        }
        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], QueueEvent::OperationStarted { id: 3, .. }));
        assert!(matches!(events[1], QueueEvent::OperationStarted { id: 4, .. }));
    }
}
