//! # Operation Queue
//!
//! A bounded-concurrency FIFO operation queue for asynchronous workloads.
//!
//! This library provides a scheduling layer that accepts opaque work items,
//! lazily converts them into executable operations, and runs them under a
//! configurable concurrency ceiling while broadcasting lifecycle events to
//! registered listeners.
//!
//! ## Core Problem Solved
//!
//! Pipelines that fan work out to asynchronous operations usually need the
//! same four guarantees, and usually re-implement them badly:
//!
//! - **Bounded concurrency**: never more than N operations in flight, with N
//!   adjustable at runtime
//! - **FIFO admission**: work starts in the order it was accepted, even when
//!   completions land out of order
//! - **Graceful shutdown**: stop accepting new work while in-flight
//!   operations run to completion, or cancel everything best-effort
//! - **Observable lifecycle**: per-operation and queue-level notifications
//!   without coupling the scheduler to any particular consumer
//!
//! ## Key Features
//!
//! - **Lazy conversion**: a queued object becomes an operation only when a
//!   concurrency slot frees up, via the object's own capability or a
//!   first-match chain of registered factories
//! - **Pluggable failure policy**: an `ErrorStrategy` decides whether a
//!   failed operation is tolerated, recorded, or halts the queue
//! - **Composability**: the queue itself implements `Operation`, so queues
//!   nest inside queues and are scheduled uniformly
//! - **Runtime-agnostic**: execution is abstracted behind a small `Spawn`
//!   trait; a Tokio adapter ships behind the `tokio-runtime` feature (on by
//!   default)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use operation_queue::builders::OperationQueueBuilder;
//! use operation_queue::config::QueueConfig;
//!
//! let queue = OperationQueueBuilder::new()
//!     .with_config(QueueConfig::new().with_max_concurrent_operations(4))
//!     .with_factory(Arc::new(|job: &RenderJob| {
//!         Some(Arc::new(RenderOperation::from(job)) as Arc<dyn Operation>)
//!     }))
//!     .build()?;
//!
//! queue.queue_objects(jobs);
//! queue.start_processing();
//! let outcome = queue.wait_until_finished().await;
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduling_core_test.rs` - FIFO and concurrency-ceiling tests
//! - `tests/lifecycle_test.rs` - drain, cancel, and listener-order tests
//! - `tests/queue_nesting_test.rs` - queue-inside-queue composition

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: operations, factories, error strategies,
/// listeners, and the queue itself.
pub mod core;
/// Configuration models for queues and failure policies.
pub mod config;
/// Builders to construct queues from configuration.
pub mod builders;
/// Runtime adapters (Tokio spawner).
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
