//! The scheduling core: a FIFO queue of work items executed under a
//! concurrency ceiling.
//!
//! All queue bookkeeping (pending queue, active set, phase transitions) is
//! serialized behind a single `parking_lot::Mutex`; capacity accounting uses
//! lock-free atomics with a CAS reservation loop so the ceiling invariant
//! holds even while object conversion runs outside the lock. Listener and
//! hook callbacks are always invoked with no lock held.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::{
    ErrorStrategy, FailureDisposition, Operation, OperationFactory, OperationId, Outcome,
    QueueListener, QueuedObject,
};

/// Abstraction for spawning operation execution on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Hook converting a queued object into an operation ahead of the built-in
/// conversion chain.
pub type CreateOperationHook<P> = Box<dyn Fn(&P) -> Option<Arc<dyn Operation>> + Send + Sync>;

/// Hook invoked just before an operation starts.
pub type WillStartHook<P> = Box<dyn Fn(OperationId, Option<&P>) + Send + Sync>;

/// Hook invoked after an operation reports completion.
pub type DidFinishHook<P> = Box<dyn Fn(OperationId, Option<&P>, &Outcome) + Send + Sync>;

/// Constructor-injected interception points for the scheduling loop.
///
/// Every hook defaults to absent (pass-through). `create_operation` is
/// consulted before the object's own capability and before any registered
/// factory, so a specializing caller can take over conversion entirely
/// without replacing the loop.
pub struct QueueHooks<P> {
    /// Conversion override, consulted first.
    pub create_operation: Option<CreateOperationHook<P>>,
    /// Pre-start interception.
    pub will_start: Option<WillStartHook<P>>,
    /// Post-completion interception.
    pub did_finish: Option<DidFinishHook<P>>,
}

impl<P> Default for QueueHooks<P> {
    fn default() -> Self {
        Self {
            create_operation: None,
            will_start: None,
            did_finish: None,
        }
    }
}

/// Snapshot of queue progress and utilization.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Objects and operations ever accepted.
    pub total_count: u64,
    /// Operations that reported completion (success, failure, or cancelled).
    pub finished_count: u64,
    /// Operations currently executing (including slots reserved for entries
    /// being converted).
    pub active_count: u64,
    /// Entries waiting in the FIFO.
    pub pending_count: u64,
    /// Dequeued objects dropped because no conversion produced an operation.
    pub skipped_count: u64,
    /// Current concurrency ceiling.
    pub max_concurrent_operations: u32,
}

/// Internal counters (thread-safe, lock-free).
#[derive(Debug, Default)]
struct QueueCounters {
    total: AtomicU64,
    finished: AtomicU64,
    active: AtomicU64,
    pending: AtomicU64,
    skipped: AtomicU64,
}

impl QueueCounters {
    fn snapshot(&self, max_concurrent: u32) -> QueueStats {
        QueueStats {
            total_count: self.total.load(Ordering::Relaxed),
            finished_count: self.finished.load(Ordering::Relaxed),
            active_count: self.active.load(Ordering::Relaxed),
            pending_count: self.pending.load(Ordering::Relaxed),
            skipped_count: self.skipped.load(Ordering::Relaxed),
            max_concurrent_operations: max_concurrent,
        }
    }
}

/// Per-queue scheduling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueuePhase {
    /// Not dequeuing; pending work may accumulate.
    Idle,
    /// Actively dequeuing up to the concurrency ceiling.
    Processing,
    /// No new dequeues; in-flight operations run to completion.
    Draining,
    /// Pending work discarded; in-flight operations asked to cancel.
    Cancelling,
}

/// An entry waiting in the FIFO.
enum PendingEntry<P> {
    /// Opaque object, converted on dequeue.
    Object(P),
    /// Pre-built operation, bypasses conversion.
    Operation(Arc<dyn Operation>),
}

/// An operation currently executing.
struct ActiveOperation<P> {
    op: Arc<dyn Operation>,
    object: Option<Arc<P>>,
}

/// State guarded by the scheduling mutex.
struct QueueState<P> {
    phase: QueuePhase,
    pending: VecDeque<PendingEntry<P>>,
    active: HashMap<OperationId, ActiveOperation<P>>,
    /// First recorded failure of the current run, if any.
    aggregate_failure: Option<String>,
    /// Aggregate outcome of the most recently finished run.
    last_outcome: Option<Outcome>,
    /// Entries that completed or were skipped in the current run. A queue
    /// started while empty stays in `Processing` until work arrives; natural
    /// drain requires progress so the started-empty case does not finish
    /// immediately.
    progressed: u64,
}

struct QueueInner<P, S> {
    state: Mutex<QueueState<P>>,
    counters: QueueCounters,
    max_concurrent: AtomicU32,
    next_operation_id: AtomicU64,
    factories: Mutex<Vec<Arc<dyn OperationFactory<P>>>>,
    listeners: Mutex<Vec<Arc<dyn QueueListener<P>>>>,
    error_strategy: Arc<dyn ErrorStrategy>,
    hooks: QueueHooks<P>,
    /// Signalled each time a run finishes (drain or cancel).
    drained: Notify,
    spawner: S,
}

/// FIFO operation queue with a configurable concurrency ceiling.
///
/// Work is accepted as opaque objects ([`Self::queue_object`]) converted
/// lazily on dequeue, or as pre-built operations ([`Self::queue_operation`]).
/// Both kinds share one FIFO and one ceiling. The queue itself implements
/// [`Operation`], so a loaded queue can be scheduled inside another queue.
///
/// Handles are cheap to clone; all clones drive the same queue.
pub struct OperationQueue<P, S> {
    inner: Arc<QueueInner<P, S>>,
}

impl<P, S> Clone for OperationQueue<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, S> OperationQueue<P, S>
where
    P: QueuedObject,
    S: Spawn + Send + Sync + 'static,
{
    /// Create a queue with the given failure policy and spawner.
    ///
    /// The concurrency ceiling defaults to 1 (strictly serial execution)
    /// until raised via [`Self::set_max_concurrent_operations`].
    pub fn new(error_strategy: Arc<dyn ErrorStrategy>, spawner: S) -> Self {
        Self::with_hooks(error_strategy, QueueHooks::default(), spawner)
    }

    /// Create a queue with interception hooks installed.
    pub fn with_hooks(
        error_strategy: Arc<dyn ErrorStrategy>,
        hooks: QueueHooks<P>,
        spawner: S,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    phase: QueuePhase::Idle,
                    pending: VecDeque::new(),
                    active: HashMap::new(),
                    aggregate_failure: None,
                    last_outcome: None,
                    progressed: 0,
                }),
                counters: QueueCounters::default(),
                max_concurrent: AtomicU32::new(1),
                next_operation_id: AtomicU64::new(1),
                factories: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                error_strategy,
                hooks,
                drained: Notify::new(),
                spawner,
            }),
        }
    }

    /// Append an object to the FIFO.
    ///
    /// The object is converted into an operation only when its turn to
    /// execute arrives. Safe to call from any thread while the queue is
    /// concurrently dequeuing.
    pub fn queue_object(&self, object: P) {
        {
            let mut st = self.inner.state.lock();
            st.pending.push_back(PendingEntry::Object(object));
        }
        self.inner.counters.total.fetch_add(1, Ordering::Relaxed);
        self.inner.counters.pending.fetch_add(1, Ordering::Relaxed);
        QueueInner::pump(&self.inner);
    }

    /// Append a batch of objects as one contiguous FIFO run.
    ///
    /// Equivalent to calling [`Self::queue_object`] once per element in
    /// order, but performs a single mutation of shared state, so concurrent
    /// producers cannot interleave inside the batch. No-op on empty input.
    pub fn queue_objects<I>(&self, objects: I)
    where
        I: IntoIterator<Item = P>,
    {
        let batch: Vec<PendingEntry<P>> =
            objects.into_iter().map(PendingEntry::Object).collect();
        if batch.is_empty() {
            return;
        }
        let count = batch.len() as u64;
        {
            let mut st = self.inner.state.lock();
            st.pending.extend(batch);
        }
        self.inner.counters.total.fetch_add(count, Ordering::Relaxed);
        self.inner.counters.pending.fetch_add(count, Ordering::Relaxed);
        QueueInner::pump(&self.inner);
    }

    /// Append a pre-built operation, bypassing factory conversion.
    ///
    /// The operation still waits its FIFO turn and counts against the
    /// concurrency ceiling like any converted object.
    pub fn queue_operation(&self, operation: Arc<dyn Operation>) {
        {
            let mut st = self.inner.state.lock();
            st.pending.push_back(PendingEntry::Operation(operation));
        }
        self.inner.counters.total.fetch_add(1, Ordering::Relaxed);
        self.inner.counters.pending.fetch_add(1, Ordering::Relaxed);
        QueueInner::pump(&self.inner);
    }

    /// Register an operation factory.
    ///
    /// Factories are consulted in registration order; first match wins.
    /// Registration only affects objects dequeued afterwards.
    pub fn add_operation_factory(&self, factory: Arc<dyn OperationFactory<P>>) {
        self.inner.factories.lock().push(factory);
    }

    /// Register a lifecycle listener.
    ///
    /// Listeners are notified synchronously in registration order.
    pub fn add_listener(&self, listener: Arc<dyn QueueListener<P>>) {
        self.inner.listeners.lock().push(listener);
    }

    /// Start (or resume) dequeuing. Idempotent while already processing.
    ///
    /// Transitions idle to processing, fires the queue-started event, and
    /// kicks the dequeue loop. Called while draining, it resumes the current
    /// run without a new start event. Called while cancelling, it is a no-op
    /// until the cancel completes.
    pub fn start_processing(&self) {
        let started = {
            let mut st = self.inner.state.lock();
            match st.phase {
                QueuePhase::Processing | QueuePhase::Cancelling => false,
                QueuePhase::Idle => {
                    st.phase = QueuePhase::Processing;
                    st.aggregate_failure = None;
                    st.last_outcome = None;
                    st.progressed = 0;
                    true
                }
                QueuePhase::Draining => {
                    st.phase = QueuePhase::Processing;
                    tracing::debug!("processing resumed while draining");
                    false
                }
            }
        };
        if started {
            tracing::info!("queue processing started");
            for listener in self.inner.listeners_snapshot() {
                listener.queue_started();
            }
        }
        QueueInner::pump(&self.inner);
    }

    /// Stop dequeuing new work. Idempotent while already stopped.
    ///
    /// In-flight operations run to completion; pending work stays queued.
    /// The queue-finished event fires once the active set empties.
    pub fn stop_processing(&self) {
        {
            let mut st = self.inner.state.lock();
            if st.phase != QueuePhase::Processing {
                return;
            }
            st.phase = QueuePhase::Draining;
        }
        tracing::info!("queue processing stopping; draining in-flight operations");
        QueueInner::maybe_finish(&self.inner);
    }

    /// Discard pending work and request cancellation of every active
    /// operation.
    ///
    /// The pending queue is cleared synchronously and no new operation will
    /// start afterwards; active operations decide their own cancellation
    /// latency. This is the only call that discards accepted work. Called
    /// while idle, it clears pending work without emitting events.
    pub fn request_cancel(&self) {
        let (discarded, to_cancel, was_idle) = {
            let mut st = self.inner.state.lock();
            let discarded = st.pending.len() as u64;
            st.pending.clear();
            if st.phase == QueuePhase::Idle {
                (discarded, Vec::new(), true)
            } else {
                st.phase = QueuePhase::Cancelling;
                let ops: Vec<Arc<dyn Operation>> =
                    st.active.values().map(|entry| Arc::clone(&entry.op)).collect();
                (discarded, ops, false)
            }
        };
        if discarded > 0 {
            self.inner.counters.pending.fetch_sub(discarded, Ordering::Relaxed);
        }
        tracing::info!(
            discarded = discarded,
            active = to_cancel.len(),
            "queue cancel requested"
        );
        for op in &to_cancel {
            op.request_cancel();
        }
        if !was_idle {
            QueueInner::maybe_finish(&self.inner);
        }
    }

    /// Update the concurrency ceiling.
    ///
    /// Takes effect on the next dequeue decision; operations already running
    /// above a lowered ceiling are never preempted. A ceiling of 0 pauses
    /// dequeuing until raised.
    pub fn set_max_concurrent_operations(&self, ceiling: u32) {
        self.inner.max_concurrent.store(ceiling, Ordering::Release);
        tracing::debug!(ceiling = ceiling, "concurrency ceiling updated");
        QueueInner::pump(&self.inner);
    }

    /// Current concurrency ceiling.
    #[must_use]
    pub fn max_concurrent_operations(&self) -> u32 {
        self.inner.max_concurrent.load(Ordering::Acquire)
    }

    /// Objects and operations ever accepted.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.inner.counters.total.load(Ordering::Relaxed)
    }

    /// Operations that have reported completion.
    #[must_use]
    pub fn finished_count(&self) -> u64 {
        self.inner.counters.finished.load(Ordering::Relaxed)
    }

    /// True while the queue is dequeuing new work.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().phase == QueuePhase::Processing
    }

    /// Snapshot of progress and utilization.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.inner
            .counters
            .snapshot(self.max_concurrent_operations())
    }

    /// Wait until the current run finishes and return its aggregate outcome.
    ///
    /// Resolves at the next drain or cancel. If the queue is already idle
    /// after a finished run, resolves immediately with that run's outcome.
    pub async fn wait_until_finished(&self) -> Outcome {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let st = self.inner.state.lock();
                if st.phase == QueuePhase::Idle {
                    if let Some(outcome) = st.last_outcome.clone() {
                        return outcome;
                    }
                }
            }
            notified.await;
        }
    }
}

impl<P, S> QueueInner<P, S>
where
    P: QueuedObject,
    S: Spawn + Send + Sync + 'static,
{
    /// Try to reserve a concurrency slot atomically using a CAS loop.
    ///
    /// The ceiling is re-read on every attempt so runtime updates apply to
    /// the very next reservation.
    fn try_reserve_slot(&self) -> bool {
        let mut current = self.counters.active.load(Ordering::Acquire);
        loop {
            let ceiling = u64::from(self.max_concurrent.load(Ordering::Acquire));
            if current + 1 > ceiling {
                return false;
            }
            match self.counters.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn release_slot(&self) {
        self.counters.active.fetch_sub(1, Ordering::Release);
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn QueueListener<P>>> {
        self.listeners.lock().clone()
    }

    /// Convert a dequeued object into an operation.
    ///
    /// Order: the `create_operation` hook, then the object's own capability,
    /// then registered factories first-match.
    fn convert(&self, object: &P) -> Option<Arc<dyn Operation>> {
        if let Some(hook) = &self.hooks.create_operation {
            if let Some(op) = hook(object) {
                return Some(op);
            }
        }
        if let Some(op) = object.create_operation() {
            return Some(op);
        }
        let factories = self.factories.lock().clone();
        factories
            .iter()
            .find_map(|factory| factory.create_operation(object))
    }

    /// Dequeue loop: while processing, a slot is free, and work is pending,
    /// pop the head entry, convert it if needed, and start it.
    ///
    /// A slot is reserved before the pop so the ceiling invariant holds even
    /// while conversion runs outside the state lock; the slot is released on
    /// a conversion miss.
    fn pump(inner: &Arc<Self>) {
        loop {
            if !inner.try_reserve_slot() {
                break;
            }
            let entry = {
                let mut st = inner.state.lock();
                if st.phase == QueuePhase::Processing {
                    st.pending.pop_front()
                } else {
                    None
                }
            };
            let Some(entry) = entry else {
                inner.release_slot();
                break;
            };
            inner.counters.pending.fetch_sub(1, Ordering::Relaxed);
            match entry {
                PendingEntry::Operation(op) => Self::start_operation(inner, op, None),
                PendingEntry::Object(object) => match inner.convert(&object) {
                    Some(op) => Self::start_operation(inner, op, Some(Arc::new(object))),
                    None => {
                        // Silent skip: only real operations count as finished.
                        inner.counters.skipped.fetch_add(1, Ordering::Relaxed);
                        {
                            let mut st = inner.state.lock();
                            st.progressed += 1;
                        }
                        tracing::warn!("no conversion produced an operation; object skipped");
                        inner.release_slot();
                    }
                },
            }
        }
        Self::maybe_finish(inner);
    }

    /// Register a converted entry as active, fire start notifications, and
    /// spawn its execution.
    fn start_operation(inner: &Arc<Self>, op: Arc<dyn Operation>, object: Option<Arc<P>>) {
        let id = inner.next_operation_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut st = inner.state.lock();
            if st.phase == QueuePhase::Cancelling {
                // Cancelled between dequeue and start: discard unstarted.
                drop(st);
                inner.release_slot();
                return;
            }
            st.active.insert(
                id,
                ActiveOperation {
                    op: Arc::clone(&op),
                    object: object.clone(),
                },
            );
        }
        if let Some(hook) = &inner.hooks.will_start {
            hook(id, object.as_deref());
        }
        for listener in inner.listeners_snapshot() {
            listener.operation_started(id, object.as_deref());
        }
        tracing::debug!(operation = id, "operation started");
        let task_inner = Arc::clone(inner);
        inner.spawner.spawn(async move {
            let outcome = op.run().await;
            Self::complete_operation(&task_inner, id, outcome);
        });
    }

    /// Completion accounting: retire the operation, notify, consult the
    /// failure policy, then re-evaluate the dequeue loop.
    ///
    /// The concurrency slot is held until notifications return, so a racing
    /// completion cannot emit the queue-finished event ahead of this
    /// operation's finish event.
    fn complete_operation(inner: &Arc<Self>, id: OperationId, outcome: Outcome) {
        let object = {
            let mut st = inner.state.lock();
            st.progressed += 1;
            st.active.remove(&id).and_then(|entry| entry.object)
        };
        inner.counters.finished.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(operation = id, outcome = ?outcome, "operation finished");
        if let Some(hook) = &inner.hooks.did_finish {
            hook(id, object.as_deref(), &outcome);
        }
        for listener in inner.listeners_snapshot() {
            listener.operation_finished(id, object.as_deref(), &outcome);
        }
        if let Outcome::Failure(error) = &outcome {
            match inner.error_strategy.on_operation_failure(error) {
                FailureDisposition::Continue => {}
                FailureDisposition::RecordAndContinue => {
                    let mut st = inner.state.lock();
                    if st.aggregate_failure.is_none() {
                        st.aggregate_failure = Some(error.clone());
                    }
                }
                FailureDisposition::Halt => {
                    let mut st = inner.state.lock();
                    if st.aggregate_failure.is_none() {
                        st.aggregate_failure = Some(error.clone());
                    }
                    if st.phase == QueuePhase::Processing {
                        st.phase = QueuePhase::Draining;
                    }
                    drop(st);
                    tracing::warn!(
                        operation = id,
                        "failure escalated by error strategy; halting dequeue"
                    );
                }
            }
        }
        inner.release_slot();
        Self::pump(inner);
    }

    /// Emit the queue-finished event if the current run has drained.
    ///
    /// A processing run drains once the active set and the FIFO are both
    /// empty and at least one entry made progress; draining and cancelling
    /// runs finish as soon as the active set empties.
    fn maybe_finish(inner: &Arc<Self>) {
        let outcome = {
            let mut st = inner.state.lock();
            if inner.counters.active.load(Ordering::Acquire) != 0 {
                return;
            }
            let done = match st.phase {
                QueuePhase::Idle => false,
                QueuePhase::Processing => st.pending.is_empty() && st.progressed > 0,
                QueuePhase::Draining | QueuePhase::Cancelling => true,
            };
            if !done {
                return;
            }
            let outcome = if st.phase == QueuePhase::Cancelling {
                Outcome::Cancelled
            } else if let Some(error) = st.aggregate_failure.take() {
                Outcome::Failure(error)
            } else {
                Outcome::Success
            };
            st.phase = QueuePhase::Idle;
            st.last_outcome = Some(outcome.clone());
            outcome
        };
        tracing::info!(outcome = ?outcome, "queue finished");
        for listener in inner.listeners_snapshot() {
            listener.queue_finished(&outcome);
        }
        inner.drained.notify_waiters();
    }
}

/// A queue is itself an operation: running it starts processing and resolves
/// with the aggregate outcome of the run; cancelling it cancels the queue.
#[async_trait]
impl<P, S> Operation for OperationQueue<P, S>
where
    P: QueuedObject,
    S: Spawn + Send + Sync + 'static,
{
    async fn run(&self) -> Outcome {
        self.start_processing();
        self.wait_until_finished().await
    }

    fn request_cancel(&self) {
        Self::request_cancel(self);
    }
}
