//! Error types for batcher operations.

use thiserror::Error;

/// Result type for batcher operations
pub type BatcherResult<T> = Result<T, BatcherError>;

/// Error types for batcher operations
///
/// Items are opaque, so there are no data-level errors: everything here is either
/// a configuration problem caught before the control loop starts, or misuse of a
/// running batcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatcherError {
    /// Configuration error - detected at construction, the control loop never starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `stop()` was already called on this batcher
    #[error("Batcher already stopped")]
    AlreadyStopped,

    /// The control loop has terminated and no longer accepts requests
    #[error("Batcher is closed")]
    Closed,

    /// The results stream was already handed out
    #[error("Results stream already taken")]
    ResultsTaken,

    /// The results stream was dropped while a batch was being published
    #[error("Results consumer disconnected")]
    ConsumerDisconnected,
}

impl BatcherError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BatcherError::Configuration(message.into())
    }

    /// Check if this error is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, BatcherError::Configuration(_))
    }

    /// Check if this error is caller misuse of a running batcher
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            BatcherError::AlreadyStopped | BatcherError::Closed | BatcherError::ResultsTaken
        )
    }
}
