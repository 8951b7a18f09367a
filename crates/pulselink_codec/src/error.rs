//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding, framing or compressing transfer data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An envelope could not be encoded.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// The bytes are not a CBOR item at all.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// An envelope key is not valid UTF-8.
    #[error("invalid UTF-8 in envelope key")]
    InvalidUtf8,

    /// The CBOR item parsed but is not a well-formed envelope.
    #[error("invalid envelope structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// The envelope was written by a newer format revision.
    #[error("unsupported envelope version {found} (newest supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the envelope.
        found: i128,
        /// Newest version this build understands.
        supported: u8,
    },

    /// A packed buffer's header declares more bytes than the buffer holds.
    #[error("packed buffer overrun at offset {offset}: needs {needed} bytes, {available} available")]
    FrameOverrun {
        /// Offset at which the walk ran out of data.
        offset: usize,
        /// Bytes the header walk required.
        needed: usize,
        /// Bytes actually present in the buffer.
        available: usize,
    },

    /// A single blob is too large for a 32-bit length word.
    #[error("blob {index} is {len} bytes, larger than a 32-bit length word allows")]
    FrameTooLarge {
        /// Position of the blob in the input list.
        index: usize,
        /// Length of the blob.
        len: usize,
    },

    /// Compression failed.
    #[error("compression failed: {message}")]
    CompressionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Decompression failed: corrupt or oversized input.
    #[error("decompression failed: {message}")]
    DecompressionFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create a decompression failed error.
    pub fn decompression_failed(message: impl Into<String>) -> Self {
        Self::DecompressionFailed {
            message: message.into(),
        }
    }

    /// Returns true for errors that mean the input bytes are bad, as opposed
    /// to the caller handing in something unencodable.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::DecodingFailed { .. }
                | Self::InvalidStructure { .. }
                | Self::UnsupportedVersion { .. }
                | Self::FrameOverrun { .. }
                | Self::DecompressionFailed { .. }
        )
    }
}
