//! Fault injection for backend atomicity tests.

use async_trait::async_trait;
use docdex_storage::{Row, StorageBackend, StorageError, StorageResult, Transaction, WriteOp};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Faults {
    fail_commits: AtomicBool,
    fail_reads: AtomicBool,
    commits: AtomicUsize,
}

impl Faults {
    fn check_read(&self, op: &str) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::backend(format!("injected {op} failure")));
        }
        Ok(())
    }
}

/// Wraps a backend and fails commits or reads on demand.
///
/// A failing commit never reaches the wrapped backend, so nothing staged
/// on that transaction is applied.
#[derive(Clone)]
pub struct FaultyBackend {
    inner: Arc<dyn StorageBackend>,
    faults: Arc<Faults>,
}

impl FaultyBackend {
    /// Wraps `inner` with all faults disabled.
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    /// Makes every subsequent commit fail (or succeed again).
    pub fn fail_commits(&self, fail: bool) {
        self.faults.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent read fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.faults.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of commits that reached the wrapped backend.
    pub fn commits(&self) -> usize {
        self.faults.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for FaultyBackend {
    async fn read(&self, key: &str) -> StorageResult<Option<Row>> {
        self.faults.check_read("read")?;
        self.inner.read(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn smembers(&self, key: &str) -> StorageResult<Vec<String>> {
        self.faults.check_read("smembers")?;
        self.inner.smembers(key).await
    }

    async fn mget(&self, keys: &[String]) -> StorageResult<Vec<Row>> {
        self.faults.check_read("mget")?;
        self.inner.mget(keys).await
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StorageResult<Vec<Option<String>>> {
        self.faults.check_read("hmget")?;
        self.inner.hmget(key, fields).await
    }

    async fn hgetall(&self, key: &str) -> StorageResult<Vec<(String, String)>> {
        self.faults.check_read("hgetall")?;
        self.inner.hgetall(key).await
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        self.faults.check_read("zrangebyscore")?;
        self.inner.zrangebyscore(key, min, max).await
    }

    fn tx(&self) -> Box<dyn Transaction> {
        Box::new(FaultyTransaction {
            inner: self.inner.tx(),
            faults: Arc::clone(&self.faults),
        })
    }
}

struct FaultyTransaction {
    inner: Box<dyn Transaction>,
    faults: Arc<Faults>,
}

#[async_trait]
impl Transaction for FaultyTransaction {
    fn stage(&self, op: WriteOp) -> StorageResult<()> {
        self.inner.stage(op)
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StorageResult<Vec<Option<String>>> {
        self.faults.check_read("hmget")?;
        self.inner.hmget(key, fields).await
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        self.faults.check_read("zrangebyscore")?;
        self.inner.zrangebyscore(key, min, max).await
    }

    async fn commit(&self) -> StorageResult<()> {
        if self.faults.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::backend("injected commit failure"));
        }
        self.inner.commit().await?;
        self.faults.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
