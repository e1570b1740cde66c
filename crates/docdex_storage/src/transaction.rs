//! Staged write batches shared by transaction implementations.

use crate::backend::Row;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;

/// State of a write batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// The batch accepts new operations.
    Active,
    /// The batch has been handed to the backend and applied.
    Committed,
    /// Applying the batch failed; nothing was written.
    Aborted,
}

/// A single staged write.
///
/// Operations are recorded in the order they were enqueued and applied
/// in that order on commit. Callers sharing a transaction must not rely
/// on any particular interleaving between them.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Set fields on a hash row, creating it if absent.
    HSet {
        /// Row key.
        key: String,
        /// Fields to write.
        fields: Row,
    },
    /// Add members to a set.
    SAdd {
        /// Set key.
        key: String,
        /// Members to add.
        members: Vec<String>,
    },
    /// Remove members from a set.
    SRem {
        /// Set key.
        key: String,
        /// Members to remove.
        members: Vec<String>,
    },
    /// Delete a key of any type.
    Del {
        /// Key to delete.
        key: String,
    },
    /// Insert or rescore a sorted-set member.
    ZAdd {
        /// Sorted-set key.
        key: String,
        /// Score.
        score: f64,
        /// Member.
        member: String,
    },
    /// Remove a sorted-set member.
    ZRem {
        /// Sorted-set key.
        key: String,
        /// Member.
        member: String,
    },
}

impl WriteOp {
    /// Returns the key this operation touches.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::HSet { key, .. }
            | Self::SAdd { key, .. }
            | Self::SRem { key, .. }
            | Self::Del { key }
            | Self::ZAdd { key, .. }
            | Self::ZRem { key, .. } => key,
        }
    }
}

#[derive(Debug)]
struct BatchInner {
    state: TransactionState,
    ops: Vec<WriteOp>,
}

/// A thread-safe buffer of staged writes.
///
/// Any number of tasks may push onto the same batch concurrently through
/// a shared reference. The batch is drained exactly once by
/// [`WriteBatch::take`]; afterwards every push fails with
/// [`StorageError::TransactionClosed`].
#[derive(Debug)]
pub struct WriteBatch {
    inner: Mutex<BatchInner>,
}

impl WriteBatch {
    /// Creates an empty, active batch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BatchInner {
                state: TransactionState::Active,
                ops: Vec::new(),
            }),
        }
    }

    /// Stages an operation.
    pub fn push(&self, op: WriteOp) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != TransactionState::Active {
            return Err(StorageError::TransactionClosed);
        }
        inner.ops.push(op);
        Ok(())
    }

    /// Drains the staged operations and closes the batch.
    pub fn take(&self) -> StorageResult<Vec<WriteOp>> {
        let mut inner = self.inner.lock();
        if inner.state != TransactionState::Active {
            return Err(StorageError::TransactionClosed);
        }
        inner.state = TransactionState::Committed;
        Ok(std::mem::take(&mut inner.ops))
    }

    /// Marks a drained batch as aborted after a failed apply.
    pub fn mark_aborted(&self) {
        self.inner.lock().state = TransactionState::Aborted;
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().ops.len()
    }

    /// Returns true if nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the staged operations.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WriteOp> {
        self.inner.lock().ops.clone()
    }
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}
