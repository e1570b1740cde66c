//! Index maintenance contract and event wiring.

use crate::document::{Document, DocumentId};
use crate::error::CoreResult;
use crate::events::{Event, EventBus, EventHandler, Subscription};
use async_trait::async_trait;
use docdex_storage::Transaction;
use std::sync::Arc;

/// A secondary structure kept consistent with a collection's documents.
///
/// Both operations only stage writes on `tx`. Each keeps a per-document
/// forward record so removal never needs the document's previous field
/// values.
#[async_trait]
pub trait SecondaryIndex: Send + Sync {
    /// Index name, used in log fields.
    fn name(&self) -> &str;

    /// Stages entries for the current values of `documents`.
    async fn index(&self, tx: &dyn Transaction, documents: &[Document]) -> CoreResult<()>;

    /// Stages removal of every entry currently attributed to `ids`.
    async fn remove_from_index(&self, tx: &dyn Transaction, ids: &[DocumentId]) -> CoreResult<()>;
}

/// Drives a [`SecondaryIndex`] from lifecycle events.
///
/// - create: index the new documents
/// - update: remove the old entries, then index the merged documents
/// - delete: remove the entries
struct Maintainer<I>(Arc<I>);

#[async_trait]
impl<I: SecondaryIndex + 'static> EventHandler for Maintainer<I> {
    async fn handle(
        &self,
        event: Event,
        tx: &dyn Transaction,
        documents: &[Document],
    ) -> CoreResult<()> {
        tracing::trace!(index = self.0.name(), %event, documents = documents.len(), "maintaining");
        match event {
            Event::Create => self.0.index(tx, documents).await,
            Event::Update => {
                let ids = ids_of(documents);
                self.0.remove_from_index(tx, &ids).await?;
                self.0.index(tx, documents).await
            }
            Event::Delete => self.0.remove_from_index(tx, &ids_of(documents)).await,
        }
    }
}

fn ids_of(documents: &[Document]) -> Vec<DocumentId> {
    documents.iter().map(|doc| doc.id().clone()).collect()
}

/// Subscribes `index` to every lifecycle event on `bus`.
pub(crate) fn subscribe<I: SecondaryIndex + 'static>(
    bus: &EventBus,
    index: Arc<I>,
) -> Vec<Subscription> {
    let handler: Arc<dyn EventHandler> = Arc::new(Maintainer(index));
    Event::ALL
        .into_iter()
        .map(|event| bus.listen(event, Arc::clone(&handler)))
        .collect()
}
