//! Storage backend and transaction trait definitions.

use crate::error::{StorageError, StorageResult};
use crate::transaction::WriteOp;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A flat row: field name to string value.
///
/// The backend stores only strings. Interpreting them is the caller's job.
pub type Row = BTreeMap<String, String>;

/// An atomic batch of writes against a [`StorageBackend`].
///
/// Writes are staged through a shared reference so that several
/// concurrent tasks can enqueue onto one transaction. Nothing is visible
/// to readers until [`Transaction::commit`] succeeds, and a failed commit
/// applies nothing.
///
/// Implementors provide [`Transaction::stage`], the two reads and
/// `commit`; the named write helpers are provided in terms of `stage`.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Stages a write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TransactionClosed`] once the transaction
    /// has been committed or has failed.
    fn stage(&self, op: WriteOp) -> StorageResult<()>;

    /// Reads named fields of a hash row from committed state.
    ///
    /// The result is positional: one entry per requested field, `None`
    /// where the field (or the whole row) is absent.
    async fn hmget(&self, key: &str, fields: &[String]) -> StorageResult<Vec<Option<String>>>;

    /// Reads sorted-set members with `min <= score <= max` from committed
    /// state, in ascending score order.
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>>;

    /// Applies every staged write atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be applied; in that case
    /// no staged write is visible.
    async fn commit(&self) -> StorageResult<()>;

    /// Stages a write of `fields` onto the hash row at `key`.
    fn hset(&self, key: &str, fields: Row) -> StorageResult<()> {
        self.stage(WriteOp::HSet {
            key: key.to_string(),
            fields,
        })
    }

    /// Stages adding `members` to the set at `key`.
    fn sadd(&self, key: &str, members: &[String]) -> StorageResult<()> {
        self.stage(WriteOp::SAdd {
            key: key.to_string(),
            members: members.to_vec(),
        })
    }

    /// Stages removing `members` from the set at `key`.
    fn srem(&self, key: &str, members: &[String]) -> StorageResult<()> {
        self.stage(WriteOp::SRem {
            key: key.to_string(),
            members: members.to_vec(),
        })
    }

    /// Stages deleting `key`.
    fn del(&self, key: &str) -> StorageResult<()> {
        self.stage(WriteOp::Del {
            key: key.to_string(),
        })
    }

    /// Stages a scored insert into the sorted set at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidScore`] for NaN or infinite scores.
    fn zadd(&self, key: &str, score: f64, member: &str) -> StorageResult<()> {
        if !score.is_finite() {
            return Err(StorageError::InvalidScore {
                score,
                member: member.to_string(),
            });
        }
        self.stage(WriteOp::ZAdd {
            key: key.to_string(),
            score,
            member: member.to_string(),
        })
    }

    /// Stages removing `member` from the sorted set at `key`.
    fn zrem(&self, key: &str, member: &str) -> StorageResult<()> {
        self.stage(WriteOp::ZRem {
            key: key.to_string(),
            member: member.to_string(),
        })
    }
}

/// A row/set/sorted-set store with atomic transaction batches.
///
/// This is the narrow primitive set the indexing layer is built on. It
/// mirrors a subset of Redis: hash rows, plain sets and scored sets.
///
/// # Invariants
///
/// - Reads observe only committed transactions
/// - A commit is all-or-nothing
/// - Reading an absent key yields an empty result, never an error
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and embedding
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stages a flat row write under `key` as part of `tx`.
    fn create(&self, key: &str, row: Row, tx: &dyn Transaction) -> StorageResult<()> {
        tx.hset(key, row)
    }

    /// Reads the whole row at `key`, or `None` if absent.
    async fn read(&self, key: &str) -> StorageResult<Option<Row>>;

    /// Removes `key` immediately, outside any transaction.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Returns the members of the set at `key`.
    async fn smembers(&self, key: &str) -> StorageResult<Vec<String>>;

    /// Reads the rows at several keys, skipping absent ones.
    async fn mget(&self, keys: &[String]) -> StorageResult<Vec<Row>>;

    /// Reads named fields of a hash row.
    ///
    /// The result is positional: one entry per requested field.
    async fn hmget(&self, key: &str, fields: &[String]) -> StorageResult<Vec<Option<String>>>;

    /// Returns every field/value pair of a hash row.
    async fn hgetall(&self, key: &str) -> StorageResult<Vec<(String, String)>>;

    /// Returns sorted-set members with `min <= score <= max`, ascending.
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>>;

    /// Opens a new transaction.
    fn tx(&self) -> Box<dyn Transaction>;
}
