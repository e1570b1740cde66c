//! Document collections.
//!
//! A [`Collection`] owns the write pipeline for one named set of
//! documents. Every write:
//!
//! 1. builds the new document state and its row
//! 2. opens one backend transaction
//! 3. stages the primary row change and emits the lifecycle event, so
//!    every subscribed index stages its own maintenance
//! 4. commits once
//!
//! A failure at any step aborts before the commit, leaving neither the
//! row nor any index entry changed. The collection performs no
//! compensating writes of its own.
//!
//! # Concurrency
//!
//! [`Collection::update`] is an unguarded read-modify-write. Two
//! concurrent updates of one document race and the later commit wins;
//! callers needing isolation must serialize updates themselves.

use crate::config::Config;
use crate::document::{
    now_millis, Document, DocumentId, IdGenerator, Meta, UuidGenerator, META_FIELD,
};
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventBus, Subscription};
use crate::index::{RangeIndex, RangeIndexConfig, SecondaryIndex, TermIndex, TermIndexConfig};
use crate::keys;
use docdex_codec::{Data, JsonCodec, ValueCodec};
use docdex_storage::StorageBackend;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

/// State shared between a collection and the indexes it created.
#[derive(Clone)]
pub(crate) struct CollectionContext {
    pub(crate) name: String,
    pub(crate) backend: Arc<dyn StorageBackend>,
    pub(crate) codec: Arc<dyn ValueCodec>,
    pub(crate) config: Config,
}

type Claims = Arc<Mutex<HashSet<String>>>;

/// Exclusive hold on an index storage namespace within one collection.
///
/// Released on drop.
#[derive(Debug)]
pub(crate) struct Claim {
    registry: Weak<Mutex<HashSet<String>>>,
    namespace: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.namespace);
        }
    }
}

/// A named collection of schemaless documents with secondary indexes.
///
/// Cloning yields another handle to the same collection: both share the
/// event bus and index registrations.
///
/// # Example
///
/// ```
/// use docdex_core::{Collection, TermIndexConfig};
/// use docdex_storage::InMemoryBackend;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let users = Collection::new("users", Arc::new(InMemoryBackend::new())).unwrap();
/// let by_city = users
///     .term_index(TermIndexConfig::new("by_city", ["city"]).values(["name"]))
///     .unwrap();
///
/// let data = json!({"name": "Ann", "city": "Berlin"});
/// users.create(data.as_object().cloned().unwrap()).await.unwrap();
///
/// let query = json!({"city": "Berlin"});
/// let found = by_city.match_terms(query.as_object().unwrap()).await.unwrap();
/// assert_eq!(found[0].get("name"), Some(&json!("Ann")));
/// # });
/// ```
#[derive(Clone)]
pub struct Collection {
    ctx: Arc<CollectionContext>,
    ids: Arc<dyn IdGenerator>,
    bus: EventBus,
    claims: Claims,
}

impl Collection {
    /// Opens the collection `name` on `backend` with default configuration.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidCollection`] if `name` is empty or
    /// contains `:`.
    pub fn new(name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> CoreResult<Self> {
        Self::with_config(name, backend, Config::default())
    }

    /// Opens the collection `name` on `backend` with `config`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidCollection`] if `name` is empty or
    /// contains `:`.
    pub fn with_config(
        name: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(':') {
            return Err(CoreError::InvalidCollection {
                name,
                message: "name must be non-empty and contain no ':'".to_string(),
            });
        }
        let ids = Arc::new(UuidGenerator::new(config.id_prefix.clone()));
        Ok(Self {
            ctx: Arc::new(CollectionContext {
                name,
                backend,
                codec: Arc::new(JsonCodec),
                config,
            }),
            ids,
            bus: EventBus::new(),
            claims: Claims::default(),
        })
    }

    /// Replaces the value codec.
    ///
    /// Indexes created before this call keep decoding with the old codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        let mut ctx = (*self.ctx).clone();
        ctx.codec = codec;
        self.ctx = Arc::new(ctx);
        self
    }

    /// Replaces the id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    /// Returns the collection configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.ctx.backend
    }

    /// Returns the event bus driving this collection's indexes.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the storage key of document `id`.
    #[must_use]
    pub fn key(&self, id: &DocumentId) -> String {
        keys::document_key(&self.ctx.name, id)
    }

    /// Creates a document and returns its new id.
    ///
    /// # Errors
    ///
    /// Fails if `data` uses the reserved `_meta` field, if an index
    /// rejects the document, or if the backend fails. Nothing is written
    /// on failure.
    pub async fn create(&self, data: Data) -> CoreResult<DocumentId> {
        reject_reserved(&data)?;

        let id = self.ids.next_id();
        let meta = Meta::for_data(id.clone(), now_millis(), &data);
        let doc = Document { data, meta };
        let key = self.key(&id);
        let row = doc.to_row(self.ctx.codec.as_ref())?;

        tracing::debug!(collection = %self.ctx.name, %id, fields = doc.data.len(), "create");
        let tx = self.ctx.backend.tx();
        self.bus
            .emit(Event::Create, tx.as_ref(), std::slice::from_ref(&doc))
            .await?;
        self.ctx.backend.create(&key, row, tx.as_ref())?;
        tx.commit().await?;
        tracing::debug!(collection = %self.ctx.name, %id, "create committed");
        Ok(id)
    }

    /// Reads document `id`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the stored row cannot be decoded or the backend fails.
    pub async fn read(&self, id: &DocumentId) -> CoreResult<Option<Document>> {
        let key = self.key(id);
        match self.ctx.backend.read(&key).await? {
            Some(row) => Ok(Some(Document::from_row(
                &key,
                row,
                self.ctx.codec.as_ref(),
            )?)),
            None => Ok(None),
        }
    }

    /// Reads several documents in one round trip, skipping absent ids.
    ///
    /// # Errors
    ///
    /// Fails if a stored row cannot be decoded or the backend fails.
    pub async fn read_many(&self, ids: &[DocumentId]) -> CoreResult<Vec<Document>> {
        let row_keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let rows = self.ctx.backend.mget(&row_keys).await?;
        let prefix = format!("{}:{}", keys::ROOT, self.ctx.name);
        rows.into_iter()
            .map(|row| Document::from_row(&prefix, row, self.ctx.codec.as_ref()))
            .collect()
    }

    /// Shallow-merges `partial` into document `id` and returns the result.
    ///
    /// Type tags are recomputed for the merged fields only.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] if the document does not exist,
    /// and otherwise as [`Collection::create`].
    pub async fn update(&self, id: &DocumentId, partial: Data) -> CoreResult<Document> {
        reject_reserved(&partial)?;

        let mut doc = self
            .read(id)
            .await?
            .ok_or_else(|| CoreError::not_found(&self.ctx.name, id.as_str()))?;
        let merged = partial.len();
        doc.merge(partial);
        doc.meta.ts = now_millis();
        let key = self.key(id);
        let row = doc.to_row(self.ctx.codec.as_ref())?;

        tracing::debug!(collection = %self.ctx.name, %id, merged, "update");
        let tx = self.ctx.backend.tx();
        self.ctx.backend.create(&key, row, tx.as_ref())?;
        self.bus
            .emit(Event::Update, tx.as_ref(), std::slice::from_ref(&doc))
            .await?;
        tx.commit().await?;
        tracing::debug!(collection = %self.ctx.name, %id, "update committed");
        Ok(doc)
    }

    /// Deletes document `id` along with all of its index entries.
    ///
    /// Deleting an absent document is a no-op.
    ///
    /// # Errors
    ///
    /// Fails if the backend fails; nothing is removed in that case.
    pub async fn delete(&self, id: &DocumentId) -> CoreResult<()> {
        let Some(doc) = self.read(id).await? else {
            tracing::debug!(collection = %self.ctx.name, %id, "delete of absent document");
            return Ok(());
        };
        let key = self.key(id);

        tracing::debug!(collection = %self.ctx.name, %id, "delete");
        let tx = self.ctx.backend.tx();
        tx.del(&key)?;
        self.bus
            .emit(Event::Delete, tx.as_ref(), std::slice::from_ref(&doc))
            .await?;
        tx.commit().await?;
        tracing::debug!(collection = %self.ctx.name, %id, "delete committed");
        Ok(())
    }

    /// Creates a term index on this collection.
    ///
    /// The index only sees writes made after this call.
    ///
    /// # Errors
    ///
    /// Fails if the declaration is invalid or an index with the same name
    /// is already alive on this collection.
    pub fn term_index(&self, config: TermIndexConfig) -> CoreResult<TermIndex> {
        let claim = self.claim(keys::term_namespace(&config.name))?;
        TermIndex::open(Arc::clone(&self.ctx), &self.bus, claim, config)
    }

    /// Creates a range index on this collection.
    ///
    /// The index only sees writes made after this call.
    ///
    /// # Errors
    ///
    /// Fails if the declaration is invalid or a range index over the same
    /// path is already alive on this collection.
    pub fn range_index(&self, config: RangeIndexConfig) -> CoreResult<RangeIndex> {
        let claim = self.claim(keys::range_namespace(&config.term))?;
        RangeIndex::open(Arc::clone(&self.ctx), &self.bus, claim, config)
    }

    /// Subscribes a custom index to this collection's lifecycle events.
    ///
    /// The index is maintained until the returned subscriptions are
    /// dropped.
    pub fn attach<I: SecondaryIndex + 'static>(&self, index: Arc<I>) -> Vec<Subscription> {
        crate::index::subscribe(&self.bus, index)
    }

    fn claim(&self, namespace: String) -> CoreResult<Claim> {
        if !self.claims.lock().insert(namespace.clone()) {
            return Err(CoreError::DuplicateIndex {
                collection: self.ctx.name.clone(),
                namespace,
            });
        }
        Ok(Claim {
            registry: Arc::downgrade(&self.claims),
            namespace,
        })
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.ctx.name)
            .field("config", &self.ctx.config)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

fn reject_reserved(data: &Data) -> CoreResult<()> {
    if data.contains_key(META_FIELD) {
        return Err(CoreError::ReservedField {
            field: META_FIELD.to_string(),
        });
    }
    Ok(())
}
