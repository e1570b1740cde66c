//! Error types for docdex core.

use docdex_codec::ValueKind;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in docdex core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A backend operation failed. The enclosing write or query is aborted.
    #[error("backend failure: {0}")]
    Storage(#[from] docdex_storage::StorageError),

    /// A value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] docdex_codec::CodecError),

    /// Update targeted a document that does not exist.
    #[error("document not found: {id} in collection {collection}")]
    NotFound {
        /// The collection searched.
        collection: String,
        /// The document id that was not found.
        id: String,
    },

    /// An index references a document whose primary row is unusable.
    #[error("consistency violation at {key}: {message}")]
    ConsistencyViolation {
        /// The primary-row key that failed to hydrate.
        key: String,
        /// Description of the violation.
        message: String,
    },

    /// A dot-separated field path is malformed.
    #[error("invalid field path {path:?}: {message}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        message: String,
    },

    /// A collection name cannot namespace storage keys.
    #[error("invalid collection name {name:?}: {message}")]
    InvalidCollection {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        message: String,
    },

    /// An index or range declaration is malformed.
    #[error("invalid index {name}: {message}")]
    InvalidIndex {
        /// Index name.
        name: String,
        /// Why it was rejected.
        message: String,
    },

    /// An index with the same storage namespace is already registered.
    #[error("index already registered on collection {collection}: {namespace}")]
    DuplicateIndex {
        /// The collection.
        collection: String,
        /// The colliding namespace (`index:<name>` or `range:<path>`).
        namespace: String,
    },

    /// A range-indexed field holds a non-numeric value.
    #[error("field {path} of document {id} is {kind}, expected a number")]
    NotNumeric {
        /// The range field path.
        path: String,
        /// The offending document.
        id: String,
        /// The kind actually found.
        kind: ValueKind,
    },

    /// A unique term index already holds another document with the same terms.
    #[error("unique index {index} already holds {existing} for the terms of {id}")]
    UniqueViolation {
        /// Index name.
        index: String,
        /// The document being written.
        id: String,
        /// The document already holding the terms.
        existing: String,
    },

    /// Document data used a field name reserved for metadata.
    #[error("field name {field:?} is reserved")]
    ReservedField {
        /// The reserved name.
        field: String,
    },
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a consistency violation error.
    pub fn consistency_violation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsistencyViolation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid index error.
    pub fn invalid_index(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIndex {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true for [`CoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`CoreError::ConsistencyViolation`].
    #[must_use]
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, Self::ConsistencyViolation { .. })
    }
}
