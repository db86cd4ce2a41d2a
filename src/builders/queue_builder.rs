//! Builder assembling an operation queue from configuration.

use std::sync::Arc;

use crate::config::{ErrorStrategyConfig, QueueConfig};
use crate::core::{
    ErrorStrategy, HaltOnFailure, OperationFactory, OperationQueue, QueueError, QueueHooks,
    QueueListener, QueuedObject, RecordFailures, Spawn, TolerateFailures,
};
#[cfg(feature = "tokio-runtime")]
use crate::runtime::TokioSpawner;

/// Builds an [`OperationQueue`] from configuration plus injected
/// collaborators.
///
/// An explicitly injected error strategy takes precedence over the one
/// selected by configuration. Factories and listeners registered here are in
/// place before the queue can start, satisfying the registration-order
/// contract for both.
pub struct OperationQueueBuilder<P, S> {
    config: QueueConfig,
    error_strategy: Option<Arc<dyn ErrorStrategy>>,
    hooks: QueueHooks<P>,
    listeners: Vec<Arc<dyn QueueListener<P>>>,
    factories: Vec<Arc<dyn OperationFactory<P>>>,
    spawner: S,
}

#[cfg(feature = "tokio-runtime")]
impl<P> OperationQueueBuilder<P, TokioSpawner>
where
    P: QueuedObject,
{
    /// Create a builder spawning onto the ambient tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_spawner(TokioSpawner::current())
    }
}

#[cfg(feature = "tokio-runtime")]
impl<P> Default for OperationQueueBuilder<P, TokioSpawner>
where
    P: QueuedObject,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> OperationQueueBuilder<P, S>
where
    P: QueuedObject,
    S: Spawn + Send + Sync + 'static,
{
    /// Create a builder with an explicit spawner.
    #[must_use]
    pub fn with_spawner(spawner: S) -> Self {
        Self {
            config: QueueConfig::default(),
            error_strategy: None,
            hooks: QueueHooks::default(),
            listeners: Vec::new(),
            factories: Vec::new(),
            spawner,
        }
    }

    /// Use the given configuration.
    #[must_use]
    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject an error strategy, overriding the configured selection.
    #[must_use]
    pub fn with_error_strategy(mut self, strategy: Arc<dyn ErrorStrategy>) -> Self {
        self.error_strategy = Some(strategy);
        self
    }

    /// Install interception hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: QueueHooks<P>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Pre-register a lifecycle listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn QueueListener<P>>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Pre-register an operation factory.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn OperationFactory<P>>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Validate the configuration and construct the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfig`] when the configuration is
    /// invalid.
    pub fn build(self) -> Result<OperationQueue<P, S>, QueueError> {
        let Self {
            config,
            error_strategy,
            hooks,
            listeners,
            factories,
            spawner,
        } = self;
        config.validate()?;

        let strategy = error_strategy.unwrap_or_else(|| {
            let selected: Arc<dyn ErrorStrategy> = match config.error_strategy {
                ErrorStrategyConfig::RecordAndContinue => Arc::new(RecordFailures),
                ErrorStrategyConfig::Tolerate => Arc::new(TolerateFailures),
                ErrorStrategyConfig::Halt => Arc::new(HaltOnFailure),
            };
            selected
        });

        let queue = OperationQueue::with_hooks(strategy, hooks, spawner);
        queue.set_max_concurrent_operations(config.max_concurrent_operations);
        for factory in factories {
            queue.add_operation_factory(factory);
        }
        for listener in listeners {
            queue.add_listener(listener);
        }
        Ok(queue)
    }
}
