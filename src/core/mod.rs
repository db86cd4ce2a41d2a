//! Core scheduling abstractions and queue implementation.

pub mod error;
pub mod factory;
pub mod listener;
pub mod operation;
pub mod operation_queue;
pub mod strategy;

pub use error::{AppResult, QueueError};
pub use factory::{OperationFactory, QueuedObject};
pub use listener::{InMemoryEventLog, QueueEvent, QueueListener};
pub use operation::{CancelFlag, Operation, OperationId, Outcome};
pub use operation_queue::{
    CreateOperationHook, DidFinishHook, OperationQueue, QueueHooks, QueueStats, Spawn,
    WillStartHook,
};
pub use strategy::{
    ErrorStrategy, FailureDisposition, HaltOnFailure, RecordFailures, TolerateFailures,
};
