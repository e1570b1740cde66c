//! Numeric range index over a single field.
//!
//! Each indexed document is a member of the sorted set
//! `range:<path>` scored by its current value. A forward record
//! `range:<path>:forward:<id>` holding the score marks membership, so
//! removal can clear the entry without knowing the old value.

use crate::collection::{Claim, CollectionContext};
use crate::document::{Document, DocumentId};
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, Subscription};
use crate::index::hydrate::Hydrator;
use crate::index::traits::{subscribe, SecondaryIndex};
use crate::keys;
use crate::path::FieldPath;
use async_trait::async_trait;
use docdex_codec::ValueKind;
use docdex_storage::Transaction;
use futures::future::try_join_all;
use std::fmt;
use std::sync::Arc;

/// Declaration of a range index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeIndexConfig {
    /// Index name, used in logs.
    pub name: String,
    /// Dot-separated path of the numeric field. Namespaces storage keys.
    pub term: String,
    /// Top-level fields fetched on query. `None` fetches whole rows.
    pub values: Option<Vec<String>>,
}

impl RangeIndexConfig {
    /// Declares a range index `name` over the field at `term`.
    pub fn new(name: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            term: term.into(),
            values: None,
        }
    }

    /// Projects query results onto `values`.
    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

pub(crate) struct RangeIndexInner {
    ctx: Arc<CollectionContext>,
    name: String,
    term: FieldPath,
    hydrator: Hydrator,
}

/// A secondary index answering inclusive numeric range queries.
///
/// Maintained automatically by the collection that created it, for as
/// long as this handle is alive.
pub struct RangeIndex {
    inner: Arc<RangeIndexInner>,
    _subscriptions: Vec<Subscription>,
    _claim: Claim,
}

impl RangeIndex {
    pub(crate) fn open(
        ctx: Arc<CollectionContext>,
        bus: &EventBus,
        claim: Claim,
        config: RangeIndexConfig,
    ) -> CoreResult<Self> {
        if config.name.is_empty() {
            return Err(CoreError::invalid_index(&config.name, "name is empty"));
        }
        let term = FieldPath::parse(&config.term)?;
        if term.as_str().contains(':') {
            return Err(CoreError::invalid_path(term.as_str(), "path contains ':'"));
        }
        let hydrator = Hydrator::new(Arc::clone(&ctx), config.values.as_deref());
        let inner = Arc::new(RangeIndexInner {
            ctx,
            name: config.name,
            term,
            hydrator,
        });
        let subscriptions = subscribe(bus, Arc::clone(&inner));
        tracing::debug!(
            collection = %inner.ctx.name,
            index = %inner.name,
            term = %inner.term,
            "range index opened"
        );
        Ok(Self {
            inner,
            _subscriptions: subscriptions,
            _claim: claim,
        })
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the indexed path.
    #[must_use]
    pub fn term(&self) -> &FieldPath {
        &self.inner.term
    }

    /// Returns documents whose value lies in `[min, max]`, ascending by
    /// value. Equal values are ordered by id.
    ///
    /// An empty or inverted interval yields no documents.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::ConsistencyViolation`] if the index
    /// references a document whose row is gone, or with a backend error.
    pub async fn range(&self, min: f64, max: f64) -> CoreResult<Vec<Document>> {
        let ids = self.ids(min, max).await?;
        tracing::debug!(index = %self.inner.name, min, max, candidates = ids.len(), "range query");
        self.inner.hydrator.hydrate(&ids).await
    }

    /// Returns the ids whose value lies in `[min, max]`, in range order,
    /// without reading their rows.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    pub async fn ids(&self, min: f64, max: f64) -> CoreResult<Vec<DocumentId>> {
        if min.is_nan() || max.is_nan() || min > max {
            return Ok(Vec::new());
        }
        let inner = &self.inner;
        let ordered = keys::range_key(&inner.ctx.name, inner.term.as_str());
        Ok(inner
            .ctx
            .backend
            .zrangebyscore(&ordered, min, max)
            .await?
            .into_iter()
            .map(DocumentId::from)
            .collect())
    }
}

impl fmt::Debug for RangeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeIndex")
            .field("collection", &self.inner.ctx.name)
            .field("name", &self.inner.name)
            .field("term", &self.inner.term)
            .finish_non_exhaustive()
    }
}

impl RangeIndexInner {
    fn index_one(&self, tx: &dyn Transaction, doc: &Document) -> CoreResult<()> {
        let id = doc.id();
        let value = match self.term.resolve(&doc.data) {
            Ok(value) => value,
            Err(missing) => {
                tracing::trace!(index = %self.name, %id, %missing, "not indexed");
                return Ok(());
            }
        };
        let score = value.as_f64().ok_or_else(|| CoreError::NotNumeric {
            path: self.term.to_string(),
            id: id.to_string(),
            kind: ValueKind::of(value),
        })?;

        tracing::trace!(index = %self.name, %id, score, "staging range entry");
        let path = self.term.as_str();
        tx.zadd(&keys::range_key(&self.ctx.name, path), score, id.as_str())?;
        tx.sadd(
            &keys::range_forward_key(&self.ctx.name, path, id),
            &[score.to_string()],
        )?;
        Ok(())
    }

    async fn remove_one(&self, tx: &dyn Transaction, id: &DocumentId) -> CoreResult<()> {
        let path = self.term.as_str();
        let forward = keys::range_forward_key(&self.ctx.name, path, id);
        let record = self.ctx.backend.smembers(&forward).await?;
        if record.is_empty() {
            return Ok(());
        }

        tracing::trace!(index = %self.name, %id, "staging range removal");
        tx.zrem(&keys::range_key(&self.ctx.name, path), id.as_str())?;
        tx.del(&forward)?;
        Ok(())
    }
}

#[async_trait]
impl SecondaryIndex for RangeIndexInner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn index(&self, tx: &dyn Transaction, documents: &[Document]) -> CoreResult<()> {
        documents.iter().try_for_each(|doc| self.index_one(tx, doc))
    }

    async fn remove_from_index(&self, tx: &dyn Transaction, ids: &[DocumentId]) -> CoreResult<()> {
        try_join_all(ids.iter().map(|id| self.remove_one(tx, id))).await?;
        Ok(())
    }
}
