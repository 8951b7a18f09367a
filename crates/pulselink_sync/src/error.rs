//! Error types for the sync layer.

use crate::channel::ChannelError;
use pulselink_codec::CodecError;
use pulselink_core::CoreError;
use pulselink_protocol::ModelError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A single channel call failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Every attempt to deliver a unit failed.
    #[error("send failed after {attempts} attempt(s): {last_error}")]
    SendFailed {
        /// Number of channel calls made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: ChannelError,
    },

    /// Envelope, framing or compression error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Sensor model error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Pending store error.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// A resync pass is already running on this engine.
    #[error("resync already in progress")]
    ResyncInProgress,

    /// The operation was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Returns true if repeating the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Channel(e) => e.is_retryable(),
            SyncError::SendFailed { last_error, .. } => last_error.is_retryable(),
            SyncError::ResyncInProgress | SyncError::Cancelled => true,
            _ => false,
        }
    }

    /// Returns true for malformed received data.
    pub fn is_malformed_input(&self) -> bool {
        match self {
            SyncError::Codec(e) => e.is_malformed_input(),
            SyncError::Model(ModelError::Payload { .. } | ModelError::UnknownSensor { .. }) => {
                true
            }
            _ => false,
        }
    }
}
