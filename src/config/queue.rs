//! Queue configuration structures.

use serde::{Deserialize, Serialize};

use crate::core::QueueError;

/// Failure policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategyConfig {
    /// Failures never stop the queue; the aggregate outcome reports them.
    RecordAndContinue,
    /// Failures are contained to their operation.
    Tolerate,
    /// The first failure stops all further dequeuing.
    Halt,
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Concurrency ceiling for executing operations.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_operations: u32,
    /// Failure policy selection.
    #[serde(default = "default_error_strategy")]
    pub error_strategy: ErrorStrategyConfig,
}

const fn default_max_concurrent() -> u32 {
    1
}

const fn default_error_strategy() -> ErrorStrategyConfig {
    ErrorStrategyConfig::RecordAndContinue
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: default_max_concurrent(),
            error_strategy: default_error_strategy(),
        }
    }
}

impl QueueConfig {
    /// Create a configuration with defaults (serial execution, failures
    /// recorded).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency ceiling.
    #[must_use]
    pub const fn with_max_concurrent_operations(mut self, ceiling: u32) -> Self {
        self.max_concurrent_operations = ceiling;
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub const fn with_error_strategy(mut self, strategy: ErrorStrategyConfig) -> Self {
        self.error_strategy = strategy;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfig`] when the ceiling is zero.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.max_concurrent_operations == 0 {
            return Err(QueueError::InvalidConfig(
                "max_concurrent_operations must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse a configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Parse`] on malformed input or
    /// [`QueueError::InvalidConfig`] on invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, QueueError> {
        let cfg: Self =
            serde_json::from_str(input).map_err(|e| QueueError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
