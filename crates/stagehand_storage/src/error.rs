//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key or ref does not exist.
    #[error("key not found: {key}")]
    NotFound {
        /// Encoded form of the missing key.
        key: String,
    },

    /// The store could not be reached or listed.
    #[error("storage unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// A write to the store did not complete.
    #[error("write failed for {key}: {reason}")]
    WriteFailed {
        /// Encoded form of the key being written.
        key: String,
        /// Description of the failure.
        reason: String,
    },

    /// Stored data failed an integrity check.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Encoding or decoding a stored value failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Creates a not-found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error reports an absent key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
