//! Exact-match term index.
//!
//! A term index buckets documents by the fingerprint of their values at
//! a fixed set of field paths:
//!
//! - reverse set `index:<name>:reverse:<hash>`: ids whose current tuple
//!   hashes to `hash`
//! - forward set `index:<name>:forward:<id>`: the hashes currently
//!   referencing `id`
//!
//! Removal reads the forward set instead of recomputing old values, so an
//! update can move a document between buckets without knowing what it
//! looked like before.

use crate::collection::{Claim, CollectionContext};
use crate::document::{Document, DocumentId};
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, Subscription};
use crate::hashing::term_fingerprint;
use crate::index::hydrate::Hydrator;
use crate::index::traits::{subscribe, SecondaryIndex};
use crate::keys;
use crate::path::FieldPath;
use async_trait::async_trait;
use docdex_codec::{Data, Field};
use docdex_storage::Transaction;
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Declaration of a term index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermIndexConfig {
    /// Index name. Namespaces the index's storage keys.
    pub name: String,
    /// Dot-separated paths whose values form the indexed tuple.
    pub terms: Vec<String>,
    /// Top-level fields fetched on match. `None` fetches whole rows.
    pub values: Option<Vec<String>>,
    /// Rejects a second document with the same tuple.
    pub unique: bool,
}

impl TermIndexConfig {
    /// Declares an index `name` over `terms`.
    pub fn new<I, S>(name: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            terms: terms.into_iter().map(Into::into).collect(),
            values: None,
            unique: false,
        }
    }

    /// Projects match results onto `values`.
    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

pub(crate) struct TermIndexInner {
    ctx: Arc<CollectionContext>,
    name: String,
    terms: Vec<FieldPath>,
    unique: bool,
    hydrator: Hydrator,
}

/// An exact-match secondary index over one or more field paths.
///
/// Maintained automatically by the collection that created it, for as
/// long as this handle is alive.
pub struct TermIndex {
    inner: Arc<TermIndexInner>,
    _subscriptions: Vec<Subscription>,
    _claim: Claim,
}

impl TermIndex {
    pub(crate) fn open(
        ctx: Arc<CollectionContext>,
        bus: &EventBus,
        claim: Claim,
        config: TermIndexConfig,
    ) -> CoreResult<Self> {
        let terms = validate(&config)?;
        let hydrator = Hydrator::new(Arc::clone(&ctx), config.values.as_deref());
        let inner = Arc::new(TermIndexInner {
            ctx,
            name: config.name,
            terms,
            unique: config.unique,
            hydrator,
        });
        let subscriptions = subscribe(bus, Arc::clone(&inner));
        tracing::debug!(
            collection = %inner.ctx.name,
            index = %inner.name,
            terms = inner.terms.len(),
            unique = inner.unique,
            "term index opened"
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

    /// Returns the indexed paths in declaration order.
    #[must_use]
    pub fn terms(&self) -> &[FieldPath] {
        &self.inner.terms
    }

    /// Returns true if the index rejects duplicate tuples.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.inner.unique
    }

    /// Returns the documents whose current tuple equals `terms`.
    ///
    /// Keys of `terms` are field paths as declared. The supplied pairs are
    /// fingerprinted exactly like indexed documents, so a query naming
    /// only some of the indexed paths matches nothing.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::ConsistencyViolation`] if a bucket references
    /// a document whose row is gone, or with a backend error.
    pub async fn match_terms(&self, terms: &Data) -> CoreResult<Vec<Document>> {
        let inner = &self.inner;
        let ids = self.candidates(terms).await?;
        tracing::debug!(index = %inner.name, candidates = ids.len(), "term match");
        inner.hydrator.hydrate(&ids).await
    }

    /// Returns the ids currently attributed to `terms`, sorted, without
    /// reading their rows.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    pub async fn ids(&self, terms: &Data) -> CoreResult<Vec<DocumentId>> {
        let mut ids = self.candidates(terms).await?;
        ids.sort();
        Ok(ids)
    }

    async fn candidates(&self, terms: &Data) -> CoreResult<Vec<DocumentId>> {
        let inner = &self.inner;
        let mismatched = terms.len() != inner.terms.len()
            || inner.terms.iter().any(|path| !terms.contains_key(path.as_str()));
        if mismatched {
            tracing::debug!(
                index = %inner.name,
                supplied = ?terms.keys().collect::<Vec<_>>(),
                "match terms differ from the indexed paths"
            );
        }

        let hash = term_fingerprint(terms.iter().map(|(path, value)| (path.as_str(), value)));
        let reverse = keys::term_reverse_key(&inner.ctx.name, &inner.name, &hash);
        Ok(inner
            .ctx
            .backend
            .smembers(&reverse)
            .await?
            .into_iter()
            .map(DocumentId::from)
            .collect())
    }
}

impl fmt::Debug for TermIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermIndex")
            .field("collection", &self.inner.ctx.name)
            .field("name", &self.inner.name)
            .field("terms", &self.inner.terms)
            .field("unique", &self.inner.unique)
            .finish_non_exhaustive()
    }
}

fn validate(config: &TermIndexConfig) -> CoreResult<Vec<FieldPath>> {
    if config.name.is_empty() || config.name.contains(':') {
        return Err(CoreError::invalid_index(
            &config.name,
            "name must be non-empty and contain no ':'",
        ));
    }
    if config.terms.is_empty() {
        return Err(CoreError::invalid_index(&config.name, "no term paths"));
    }
    let mut seen = BTreeSet::new();
    let mut terms = Vec::with_capacity(config.terms.len());
    for raw in &config.terms {
        let path = FieldPath::parse(raw)?;
        if !seen.insert(path.clone()) {
            return Err(CoreError::invalid_index(
                &config.name,
                format!("term path {raw:?} declared twice"),
            ));
        }
        terms.push(path);
    }
    Ok(terms)
}

impl TermIndexInner {
    fn project<'a>(&'a self, doc: &'a Document) -> Option<Vec<(&'a str, &'a Field)>> {
        let mut tuple = Vec::with_capacity(self.terms.len());
        for path in &self.terms {
            match path.resolve(&doc.data) {
                Ok(value) => tuple.push((path.as_str(), value)),
                Err(missing) => {
                    tracing::trace!(index = %self.name, id = %doc.id(), %missing, "not indexed");
                    return None;
                }
            }
        }
        Some(tuple)
    }

    async fn index_one(&self, tx: &dyn Transaction, doc: &Document) -> CoreResult<()> {
        let Some(tuple) = self.project(doc) else {
            return Ok(());
        };
        let hash = term_fingerprint(tuple);
        let id = doc.id();
        let reverse = keys::term_reverse_key(&self.ctx.name, &self.name, &hash);

        if self.unique {
            let holders = self.ctx.backend.smembers(&reverse).await?;
            if let Some(existing) = holders.into_iter().find(|held| held != id.as_str()) {
                return Err(CoreError::UniqueViolation {
                    index: self.name.clone(),
                    id: id.to_string(),
                    existing,
                });
            }
        }

        tracing::trace!(index = %self.name, %id, %hash, "staging term entry");
        let forward = keys::term_forward_key(&self.ctx.name, &self.name, id);
        tx.sadd(&forward, &[hash])?;
        tx.sadd(&reverse, &[id.to_string()])?;
        Ok(())
    }

    async fn remove_one(&self, tx: &dyn Transaction, id: &DocumentId) -> CoreResult<()> {
        let forward = keys::term_forward_key(&self.ctx.name, &self.name, id);
        let hashes = self.ctx.backend.smembers(&forward).await?;
        tracing::trace!(index = %self.name, %id, buckets = hashes.len(), "staging term removal");

        tx.del(&forward)?;
        let member = [id.to_string()];
        for hash in hashes {
            tx.srem(&keys::term_reverse_key(&self.ctx.name, &self.name, &hash), &member)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SecondaryIndex for TermIndexInner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn index(&self, tx: &dyn Transaction, documents: &[Document]) -> CoreResult<()> {
        try_join_all(documents.iter().map(|doc| self.index_one(tx, doc))).await?;
        Ok(())
    }

    async fn remove_from_index(&self, tx: &dyn Transaction, ids: &[DocumentId]) -> CoreResult<()> {
        try_join_all(ids.iter().map(|id| self.remove_one(tx, id))).await?;
        Ok(())
    }
}
