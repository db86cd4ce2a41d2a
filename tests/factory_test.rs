//! Integration tests for object-to-operation conversion: capability
//! precedence, factory first-match, the silent-skip policy, and direct
//! operation enqueue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use operation_queue::builders::OperationQueueBuilder;
use operation_queue::core::{
    Operation, OperationQueue, Outcome, QueueHooks, QueuedObject, RecordFailures,
};
use operation_queue::runtime::TokioSpawner;
use parking_lot::Mutex;

// ============================================================================
// HELPERS
// ============================================================================

/// Queued object whose optional capability is controlled per instance.
#[derive(Debug, Clone)]
struct Document {
    name: String,
    self_converting: bool,
    started: Arc<Mutex<Vec<String>>>,
}

impl Document {
    fn new(name: &str, self_converting: bool, started: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            self_converting,
            started: Arc::clone(started),
        }
    }
}

impl QueuedObject for Document {
    fn create_operation(&self) -> Option<Arc<dyn Operation>> {
        if self.self_converting {
            Some(Arc::new(TagOperation {
                tag: format!("capability:{}", self.name),
                started: Arc::clone(&self.started),
            }))
        } else {
            None
        }
    }
}

/// Operation that records a tag describing who built it.
struct TagOperation {
    tag: String,
    started: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Operation for TagOperation {
    async fn run(&self) -> Outcome {
        self.started.lock().push(self.tag.clone());
        tokio::time::sleep(Duration::from_millis(1)).await;
        Outcome::Success
    }

    fn request_cancel(&self) {}
}

fn tag_factory(
    prefix: &'static str,
    matches: impl Fn(&Document) -> bool + Send + Sync + 'static,
) -> impl Fn(&Document) -> Option<Arc<dyn Operation>> + Send + Sync + 'static {
    move |doc: &Document| {
        if matches(doc) {
            Some(Arc::new(TagOperation {
                tag: format!("{prefix}:{}", doc.name),
                started: Arc::clone(&doc.started),
            }) as Arc<dyn Operation>)
        } else {
            None
        }
    }
}

fn make_queue() -> OperationQueue<Document, TokioSpawner> {
    OperationQueue::new(Arc::new(RecordFailures), TokioSpawner::current())
}

async fn finish(queue: &OperationQueue<Document, TokioSpawner>) -> Outcome {
    tokio::time::timeout(Duration::from_secs(5), queue.wait_until_finished())
        .await
        .expect("queue did not finish in time")
}

// ============================================================================
// CONVERSION PRECEDENCE
// ============================================================================

#[tokio::test]
async fn object_capability_wins_over_factories() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let queue = make_queue();
    queue.add_operation_factory(Arc::new(tag_factory("factory", |_| true)));

    queue.queue_object(Document::new("doc", true, &started));
    queue.start_processing();

    assert_eq!(finish(&queue).await, Outcome::Success);
    assert_eq!(*started.lock(), vec!["capability:doc"]);
}

#[tokio::test]
async fn factories_match_in_registration_order() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let queue = make_queue();
    queue.add_operation_factory(Arc::new(tag_factory("first", |doc| {
        doc.name.starts_with('a')
    })));
    queue.add_operation_factory(Arc::new(tag_factory("second", |_| true)));

    queue.queue_objects(vec![
        Document::new("alpha", false, &started),
        Document::new("beta", false, &started),
    ]);
    queue.start_processing();

    assert_eq!(finish(&queue).await, Outcome::Success);
    // "alpha" matches both factories; the first registered wins. "beta" only
    // matches the catch-all.
    assert_eq!(*started.lock(), vec!["first:alpha", "second:beta"]);
}

#[tokio::test]
async fn create_operation_hook_precedes_the_capability() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let hook_started = Arc::clone(&started);
    let hooks = QueueHooks::<Document> {
        create_operation: Some(Box::new(move |doc: &Document| {
            Some(Arc::new(TagOperation {
                tag: format!("hook:{}", doc.name),
                started: Arc::clone(&hook_started),
            }) as Arc<dyn Operation>)
        })),
        will_start: None,
        did_finish: None,
    };
    let queue = OperationQueueBuilder::<Document, _>::new()
        .with_hooks(hooks)
        .build()
        .unwrap();

    // Self-converting object: without the hook the capability would win.
    queue.queue_object(Document::new("doc", true, &started));
    queue.start_processing();

    assert_eq!(finish(&queue).await, Outcome::Success);
    assert_eq!(*started.lock(), vec!["hook:doc"]);
}

// ============================================================================
// SILENT SKIP
// ============================================================================

#[tokio::test]
async fn unconvertible_objects_are_skipped_without_failing_the_queue() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let queue = make_queue();
    queue.add_operation_factory(Arc::new(tag_factory("factory", |doc| {
        doc.name != "orphan"
    })));

    queue.queue_objects(vec![
        Document::new("one", false, &started),
        Document::new("orphan", false, &started),
        Document::new("two", false, &started),
    ]);
    queue.start_processing();

    // The skipped object neither fails the queue nor counts as finished.
    assert_eq!(finish(&queue).await, Outcome::Success);
    assert_eq!(*started.lock(), vec!["factory:one", "factory:two"]);
    assert_eq!(queue.finished_count(), 2);
    assert_eq!(queue.total_count(), 3);
    assert_eq!(queue.stats().skipped_count, 1);
}

#[tokio::test]
async fn queue_of_only_unconvertible_objects_still_drains() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let queue = make_queue();

    queue.queue_object(Document::new("orphan", false, &started));
    queue.start_processing();

    assert_eq!(finish(&queue).await, Outcome::Success);
    assert!(started.lock().is_empty());
    assert_eq!(queue.finished_count(), 0);
    assert_eq!(queue.stats().skipped_count, 1);
}

// ============================================================================
// DIRECT OPERATIONS
// ============================================================================

#[tokio::test]
async fn queued_operations_bypass_factories() {
    let started = Arc::new(Mutex::new(Vec::new()));
    let factory_calls = Arc::new(AtomicU64::new(0));
    let queue = make_queue();
    {
        let factory_calls = Arc::clone(&factory_calls);
        queue.add_operation_factory(Arc::new(move |_doc: &Document| {
            factory_calls.fetch_add(1, Ordering::SeqCst);
            None::<Arc<dyn Operation>>
        }));
    }

    queue.queue_operation(Arc::new(TagOperation {
        tag: "direct".into(),
        started: Arc::clone(&started),
    }));
    queue.start_processing();

    assert_eq!(finish(&queue).await, Outcome::Success);
    assert_eq!(*started.lock(), vec!["direct"]);
    assert_eq!(factory_calls.load(Ordering::SeqCst), 0);
    assert_eq!(queue.finished_count(), 1);
}
