//! Codec errors.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Failure to turn a field into its stored string or back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The codec could not serialize a value.
    #[error("cannot encode field: {message}")]
    EncodingFailed {
        /// Codec message.
        message: String,
    },

    /// A stored string is not valid codec output.
    #[error("cannot decode stored field: {message}")]
    DecodingFailed {
        /// Codec message.
        message: String,
    },
}

impl CodecError {
    /// Creates an [`CodecError::EncodingFailed`].
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Creates a [`CodecError::DecodingFailed`].
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
