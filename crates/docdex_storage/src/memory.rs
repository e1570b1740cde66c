//! In-memory storage backend.

use crate::backend::{Row, StorageBackend, Transaction};
use crate::error::{StorageError, StorageResult};
use crate::transaction::{WriteBatch, WriteOp};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A sorted-set score with a total order.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl Score {
    /// Folds `-0.0` into `0.0` so both compare equal under `total_cmp`.
    fn new(value: f64) -> Self {
        if value == 0.0 {
            Self(0.0)
        } else {
            Self(value)
        }
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Members ordered by (score, member), like a Redis sorted set.
#[derive(Debug, Clone, Default)]
struct SortedSet {
    scores: HashMap<String, Score>,
    order: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: String, score: f64) {
        let score = Score::new(score);
        if let Some(old) = self.scores.insert(member.clone(), score) {
            self.order.remove(&(old, member.clone()));
        }
        self.order.insert((score, member));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.order.remove(&(old, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).map(|s| s.0)
    }

    fn range_by_score(&self, min: f64, max: f64) -> Vec<String> {
        if min.is_nan() || max.is_nan() || min > max {
            return Vec::new();
        }
        let max = Score::new(max);
        self.order
            .range((Score::new(min), String::new())..)
            .take_while(|(score, _)| *score <= max)
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Hash(Row),
    Set(BTreeSet<String>),
    Sorted(SortedSet),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::Sorted(_) => "zset",
        }
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Entry) -> StorageError {
    StorageError::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
}

impl Keyspace {
    fn hash(&self, key: &str) -> StorageResult<Option<&Row>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Hash(row)) => Ok(Some(row)),
            Some(other) => Err(wrong_type(key, "hash", other)),
        }
    }

    fn set(&self, key: &str) -> StorageResult<Option<&BTreeSet<String>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(other) => Err(wrong_type(key, "set", other)),
        }
    }

    fn sorted(&self, key: &str) -> StorageResult<Option<&SortedSet>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Sorted(sorted)) => Ok(Some(sorted)),
            Some(other) => Err(wrong_type(key, "zset", other)),
        }
    }

    fn hmget(&self, key: &str, fields: &[String]) -> StorageResult<Vec<Option<String>>> {
        let row = self.hash(key)?;
        Ok(fields
            .iter()
            .map(|field| row.and_then(|row| row.get(field).cloned()))
            .collect())
    }

    fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        Ok(self
            .sorted(key)?
            .map(|sorted| sorted.range_by_score(min, max))
            .unwrap_or_default())
    }

    /// Applies a batch all-or-nothing.
    ///
    /// Every touched key is copied into an overlay first; the overlay is
    /// written back only when every operation succeeded.
    fn apply(&mut self, ops: Vec<WriteOp>) -> StorageResult<()> {
        let mut overlay: HashMap<String, Option<Entry>> = HashMap::new();
        for op in ops {
            let key = op.key().to_string();
            let slot = overlay
                .entry(key.clone())
                .or_insert_with(|| self.entries.get(&key).cloned());
            apply_op(slot, op)?;
        }

        for (key, slot) in overlay {
            match slot {
                Some(entry) => {
                    self.entries.insert(key, entry);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

fn apply_op(slot: &mut Option<Entry>, op: WriteOp) -> StorageResult<()> {
    match op {
        WriteOp::HSet { key, fields } => {
            if fields.is_empty() {
                return Ok(());
            }
            match slot.get_or_insert_with(|| Entry::Hash(Row::new())) {
                Entry::Hash(row) => row.extend(fields),
                other => return Err(wrong_type(&key, "hash", other)),
            }
        }
        WriteOp::SAdd { key, members } => {
            if members.is_empty() {
                return Ok(());
            }
            match slot.get_or_insert_with(|| Entry::Set(BTreeSet::new())) {
                Entry::Set(set) => set.extend(members),
                other => return Err(wrong_type(&key, "set", other)),
            }
        }
        WriteOp::SRem { key, members } => {
            let now_empty = match slot.as_mut() {
                None => return Ok(()),
                Some(Entry::Set(set)) => {
                    for member in &members {
                        set.remove(member);
                    }
                    set.is_empty()
                }
                Some(other) => return Err(wrong_type(&key, "set", other)),
            };
            if now_empty {
                *slot = None;
            }
        }
        WriteOp::Del { .. } => {
            *slot = None;
        }
        WriteOp::ZAdd { key, score, member } => {
            if !score.is_finite() {
                return Err(StorageError::InvalidScore { score, member });
            }
            match slot.get_or_insert_with(|| Entry::Sorted(SortedSet::default())) {
                Entry::Sorted(sorted) => sorted.insert(member, score),
                other => return Err(wrong_type(&key, "zset", other)),
            }
        }
        WriteOp::ZRem { key, member } => {
            let now_empty = match slot.as_mut() {
                None => return Ok(()),
                Some(Entry::Sorted(sorted)) => {
                    sorted.remove(&member);
                    sorted.is_empty()
                }
                Some(other) => return Err(wrong_type(&key, "zset", other)),
            };
            if now_empty {
                *slot = None;
            }
        }
    }
    Ok(())
}

/// An in-memory storage backend.
///
/// This backend keeps every key in process memory and is suitable for:
/// - Unit and integration tests
/// - Embedding where persistence is not needed
///
/// Commits take a single write lock and apply the whole batch or nothing.
///
/// # Thread Safety
///
/// Cloning is cheap and clones share the same keyspace.
///
/// # Example
///
/// ```rust
/// use docdex_storage::{InMemoryBackend, StorageBackend, Transaction};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let backend = InMemoryBackend::new();
/// let tx = backend.tx();
/// tx.sadd("tags", &["red".to_string()]).unwrap();
/// tx.commit().await.unwrap();
/// assert_eq!(backend.smembers("tags").await.unwrap(), vec!["red"]);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    keyspace: Arc<RwLock<Keyspace>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every key currently stored, sorted.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keyspace.read().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns true if `key` holds a value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.keyspace.read().entries.contains_key(key)
    }

    /// Returns the score of `member` in the sorted set at `key`.
    pub fn zscore(&self, key: &str, member: &str) -> StorageResult<Option<f64>> {
        Ok(self
            .keyspace
            .read()
            .sorted(key)?
            .and_then(|sorted| sorted.score(member)))
    }

    /// Clears all data from the backend.
    pub fn clear(&self) {
        self.keyspace.write().entries.clear();
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn read(&self, key: &str) -> StorageResult<Option<Row>> {
        Ok(self.keyspace.read().hash(key)?.cloned())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.keyspace.write().entries.remove(key);
        Ok(())
    }

    async fn smembers(&self, key: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .keyspace
            .read()
            .set(key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn mget(&self, keys: &[String]) -> StorageResult<Vec<Row>> {
        let keyspace = self.keyspace.read();
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(row) = keyspace.hash(key)? {
                rows.push(row.clone());
            }
        }
        Ok(rows)
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StorageResult<Vec<Option<String>>> {
        self.keyspace.read().hmget(key, fields)
    }

    async fn hgetall(&self, key: &str) -> StorageResult<Vec<(String, String)>> {
        Ok(self
            .keyspace
            .read()
            .hash(key)?
            .map(|row| row.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        self.keyspace.read().zrangebyscore(key, min, max)
    }

    fn tx(&self) -> Box<dyn Transaction> {
        Box::new(MemoryTransaction {
            keyspace: Arc::clone(&self.keyspace),
            batch: WriteBatch::new(),
        })
    }
}

/// Transaction over an [`InMemoryBackend`].
#[derive(Debug)]
struct MemoryTransaction {
    keyspace: Arc<RwLock<Keyspace>>,
    batch: WriteBatch,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn stage(&self, op: WriteOp) -> StorageResult<()> {
        self.batch.push(op)
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StorageResult<Vec<Option<String>>> {
        self.keyspace.read().hmget(key, fields)
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        self.keyspace.read().zrangebyscore(key, min, max)
    }

    async fn commit(&self) -> StorageResult<()> {
        let ops = self.batch.take()?;
        let count = ops.len();
        let result = self.keyspace.write().apply(ops);
        match &result {
            Ok(()) => tracing::trace!(ops = count, "committed in-memory batch"),
            Err(err) => {
                self.batch.mark_aborted();
                tracing::debug!(ops = count, error = %err, "in-memory batch rejected");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (s(k), s(v))).collect()
    }

    #[tokio::test]
    async fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.keys().is_empty());
        assert_eq!(backend.read("missing").await.unwrap(), None);
        assert!(backend.smembers("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_invisible_until_commit() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        backend.create("row", row(&[("a", "1")]), tx.as_ref()).unwrap();

        assert_eq!(backend.read("row").await.unwrap(), None);
        tx.commit().await.unwrap();
        assert_eq!(backend.read("row").await.unwrap(), Some(row(&[("a", "1")])));
    }

    #[tokio::test]
    async fn hset_merges_fields() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.hset("row", row(&[("a", "1"), ("b", "2")])).unwrap();
        tx.hset("row", row(&[("b", "3")])).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            backend.hgetall("row").await.unwrap(),
            vec![(s("a"), s("1")), (s("b"), s("3"))]
        );
    }

    #[tokio::test]
    async fn hmget_is_positional() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.hset("row", row(&[("a", "1"), ("c", "3")])).unwrap();
        tx.commit().await.unwrap();

        let values = backend
            .hmget("row", &[s("a"), s("b"), s("c")])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(s("1")), None, Some(s("3"))]);

        let missing = backend.hmget("nope", &[s("a")]).await.unwrap();
        assert_eq!(missing, vec![None]);
    }

    #[tokio::test]
    async fn mget_skips_absent_rows() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.hset("r1", row(&[("a", "1")])).unwrap();
        tx.hset("r3", row(&[("a", "3")])).unwrap();
        tx.commit().await.unwrap();

        let rows = backend.mget(&[s("r1"), s("r2"), s("r3")]).await.unwrap();
        assert_eq!(rows, vec![row(&[("a", "1")]), row(&[("a", "3")])]);
    }

    #[tokio::test]
    async fn set_add_and_remove() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.sadd("set", &[s("x"), s("y")]).unwrap();
        tx.srem("set", &[s("x")]).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(backend.smembers("set").await.unwrap(), vec![s("y")]);
    }

    #[tokio::test]
    async fn emptied_set_is_removed() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.sadd("set", &[s("x")]).unwrap();
        tx.commit().await.unwrap();

        let tx = backend.tx();
        tx.srem("set", &[s("x")]).unwrap();
        tx.commit().await.unwrap();

        assert!(!backend.contains_key("set"));
    }

    #[tokio::test]
    async fn sorted_set_range_is_inclusive_and_ascending() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        for (member, score) in [("d", 15.0), ("a", 1.0), ("c", 10.0), ("b", 5.0)] {
            tx.zadd("z", score, member).unwrap();
        }
        tx.commit().await.unwrap();

        let members = backend.zrangebyscore("z", 5.0, 10.0).await.unwrap();
        assert_eq!(members, vec![s("b"), s("c")]);

        let all = backend
            .zrangebyscore("z", f64::NEG_INFINITY, f64::INFINITY)
            .await
            .unwrap();
        assert_eq!(all, vec![s("a"), s("b"), s("c"), s("d")]);
    }

    #[tokio::test]
    async fn equal_scores_order_by_member() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.zadd("z", 1.0, "beta").unwrap();
        tx.zadd("z", 1.0, "alpha").unwrap();
        tx.commit().await.unwrap();

        let members = backend.zrangebyscore("z", 1.0, 1.0).await.unwrap();
        assert_eq!(members, vec![s("alpha"), s("beta")]);
    }

    #[tokio::test]
    async fn zadd_rescores_existing_member() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.zadd("z", 1.0, "m").unwrap();
        tx.zadd("z", 7.0, "m").unwrap();
        tx.commit().await.unwrap();

        assert_eq!(backend.zscore("z", "m").unwrap(), Some(7.0));
        assert!(backend.zrangebyscore("z", 0.0, 2.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zrem_removes_member() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.zadd("z", 1.0, "m").unwrap();
        tx.zadd("z", 2.0, "n").unwrap();
        tx.zrem("z", "m").unwrap();
        tx.commit().await.unwrap();

        assert_eq!(backend.zscore("z", "m").unwrap(), None);
        assert_eq!(backend.zscore("z", "n").unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn inverted_range_is_empty() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.zadd("z", 3.0, "m").unwrap();
        tx.commit().await.unwrap();

        assert!(backend.zrangebyscore("z", 5.0, 1.0).await.unwrap().is_empty());
    }

    #[test]
    fn non_finite_score_is_rejected() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        assert!(matches!(
            tx.zadd("z", f64::NAN, "m"),
            Err(StorageError::InvalidScore { .. })
        ));
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.hset("row", row(&[("a", "1")])).unwrap();
        tx.commit().await.unwrap();

        let tx = backend.tx();
        tx.sadd("set", &[s("x")]).unwrap();
        // Set operation against a hash row fails the whole batch.
        tx.sadd("row", &[s("y")]).unwrap();
        let result = tx.commit().await;

        assert!(matches!(result, Err(StorageError::WrongType { .. })));
        assert!(!backend.contains_key("set"));
        assert_eq!(backend.read("row").await.unwrap(), Some(row(&[("a", "1")])));
    }

    #[tokio::test]
    async fn committed_transaction_is_closed() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.commit().await.unwrap();

        assert_eq!(tx.del("k"), Err(StorageError::TransactionClosed));
        assert_eq!(tx.commit().await, Err(StorageError::TransactionClosed));
    }

    #[tokio::test]
    async fn transaction_reads_see_committed_state() {
        let backend = InMemoryBackend::new();
        let setup = backend.tx();
        setup.hset("row", row(&[("a", "1")])).unwrap();
        setup.zadd("z", 4.0, "m").unwrap();
        setup.commit().await.unwrap();

        let tx = backend.tx();
        tx.hset("row", row(&[("a", "2")])).unwrap();
        assert_eq!(tx.hmget("row", &[s("a")]).await.unwrap(), vec![Some(s("1"))]);
        assert_eq!(tx.zrangebyscore("z", 0.0, 5.0).await.unwrap(), vec![s("m")]);
    }

    #[tokio::test]
    async fn delete_is_immediate() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.hset("row", row(&[("a", "1")])).unwrap();
        tx.commit().await.unwrap();

        backend.delete("row").await.unwrap();
        assert_eq!(backend.read("row").await.unwrap(), None);
    }

    #[tokio::test]
    async fn wrong_type_read_fails() {
        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tx.sadd("set", &[s("x")]).unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(
            backend.read("set").await,
            Err(StorageError::WrongType { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn sorted_range_matches_filtered_model(
            entries in proptest::collection::btree_map("[a-e]{1,3}", -50i32..50, 0..20),
            min in -60i32..60,
            span in 0i32..60,
        ) {
            let max = min + span;
            let mut sorted = SortedSet::default();
            for (member, score) in &entries {
                sorted.insert(member.clone(), f64::from(*score));
            }

            let mut expected: Vec<(i32, String)> = entries
                .iter()
                .filter(|(_, score)| (min..=max).contains(*score))
                .map(|(member, score)| (*score, member.clone()))
                .collect();
            expected.sort();
            let expected: Vec<String> = expected.into_iter().map(|(_, member)| member).collect();

            proptest::prop_assert_eq!(
                sorted.range_by_score(f64::from(min), f64::from(max)),
                expected
            );
        }
    }
}
