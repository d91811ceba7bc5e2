//! Error types for locality.

use thiserror::Error;

/// Errors that can occur during training, indexing, search or persistence.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A parameter or input shape is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was attempted in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A serialized index or dataset file failed validation.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// An underlying read or write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for locality operations.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        IndexError::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        IndexError::InvalidState(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        IndexError::Corrupt(msg.into())
    }
}
