//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    /// The backend failed to carry out an operation.
    #[error("backend failure: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// An operation was applied to a key holding a different kind of value.
    #[error("wrong type for key {key}: expected {expected}, found {found}")]
    WrongType {
        /// The offending key.
        key: String,
        /// The kind the operation needs.
        expected: &'static str,
        /// The kind actually stored.
        found: &'static str,
    },

    /// A sorted-set score was NaN or infinite.
    #[error("invalid score {score} for member {member}")]
    InvalidScore {
        /// The rejected score.
        score: f64,
        /// The member it was meant for.
        member: String,
    },

    /// The transaction has already been committed or has failed.
    #[error("transaction is closed")]
    TransactionClosed,
}

impl StorageError {
    /// Creates a backend failure error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
