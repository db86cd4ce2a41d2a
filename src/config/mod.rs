//! Configuration models for queues and failure policies.

pub mod queue;

pub use queue::{ErrorStrategyConfig, QueueConfig};
