//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding rows or keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a row to CBOR.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode CBOR bytes into a row.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// The table name cannot be used in a composite key.
    #[error("invalid table name '{name}': {reason}")]
    InvalidTableName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A key value is outside the supported key domain.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// A stored composite key could not be parsed.
    #[error("malformed composite key: {key:?}")]
    MalformedKey {
        /// The raw key.
        key: String,
    },

    /// A row lacks its table's key column.
    #[error("row has no key column '{column}'")]
    MissingKeyColumn {
        /// The key column name.
        column: String,
    },

    /// A row did not serialize to a map of fields.
    #[error("row must serialize to a map of named fields")]
    NotAMap,

    /// A shard pool must hold at least one container.
    #[error("store count must be at least 1")]
    EmptyPool,
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

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Create a malformed key error.
    pub fn malformed(key: impl Into<String>) -> Self {
        Self::MalformedKey { key: key.into() }
    }
}
