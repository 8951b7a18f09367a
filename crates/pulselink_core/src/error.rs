//! Error types for the pending store.

use crate::types::RecordId;
use pulselink_storage::StorageError;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in store operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error outside the storage backend (directory and lock handling).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A requested record is not in the store.
    #[error("record not found: {id}")]
    RecordNotFound {
        /// The missing id.
        id: RecordId,
    },

    /// The log is damaged before its tail.
    #[error("log corruption at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the damaged entry.
        offset: u64,
        /// Description of the damage.
        message: String,
    },

    /// An entry's checksum does not match its content.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the entry.
        expected: u32,
        /// Checksum computed over the entry.
        actual: u32,
    },

    /// Replayed entries contradict each other.
    #[error("store consistency violation: {message}")]
    Consistency {
        /// Description of the violation.
        message: String,
    },

    /// Another process holds the store directory.
    #[error("store is locked by another process")]
    StoreLocked,

    /// Bytes or paths that are not a store.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },

    /// A blob does not fit in a single log entry.
    #[error("record too large: {len} bytes")]
    RecordTooLarge {
        /// Size of the rejected blob.
        len: usize,
    },
}

impl CoreError {
    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates a consistency error.
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if the error means the on-disk log is damaged.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::LogCorruption { .. } | Self::ChecksumMismatch { .. } | Self::InvalidFormat { .. }
        )
    }
}
