//! Error types for queue construction and configuration.

use thiserror::Error;

/// Errors produced by queue components.
///
/// Operation-level failures never surface here; they travel through
/// [`crate::core::Outcome`] and listener events only.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Configuration could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
