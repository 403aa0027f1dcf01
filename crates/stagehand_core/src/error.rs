//! Error types for the staging layer.

use stagehand_storage::{IndexValue, StorageError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in staging operations.
///
/// Absence of staged data or of a head record is never an error; those are
/// reported as empty or `None` values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A specific key expected to exist was absent.
    #[error("not found: {key}")]
    NotFound {
        /// Encoded form of the missing key.
        key: String,
    },

    /// The frame's index is not monotonic.
    #[error("index not monotonic at row {position}: {current} follows {previous}")]
    InvalidIndex {
        /// Row where the violation was found.
        position: usize,
        /// Index value of the preceding row.
        previous: IndexValue,
        /// Index value of the offending row.
        current: IndexValue,
    },

    /// The frame is structurally malformed.
    #[error("invalid frame: {message}")]
    InvalidFrame {
        /// Description of the problem.
        message: String,
    },

    /// A write to the store failed.
    #[error("storage write failed: {message}")]
    StorageWriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// The store could not be read or listed.
    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// A stored record failed to decode or verify.
    #[error("corrupted record: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Creates a storage write failure.
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::StorageWriteFailed {
            message: message.into(),
        }
    }

    /// Creates a storage unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Maps a storage error raised while writing; every failure becomes
    /// [`CoreError::StorageWriteFailed`].
    pub fn from_write(err: StorageError) -> Self {
        Self::write_failed(err.to_string())
    }

    /// Returns true if this error reports an absent key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => Self::NotFound { key },
            StorageError::WriteFailed { .. } => Self::write_failed(err.to_string()),
            StorageError::Corrupted(message) | StorageError::Codec(message) => {
                Self::Corrupted { message }
            }
            StorageError::Unavailable { .. } | StorageError::Io(_) => {
                Self::unavailable(err.to_string())
            }
        }
    }
}
