//! Turning candidate ids into decoded documents.

use crate::collection::CollectionContext;
use crate::document::{Document, DocumentId, META_FIELD};
use crate::error::{CoreError, CoreResult};
use crate::keys;
use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Fetches and decodes the rows behind query candidates.
///
/// With a projection only `_meta` and the projected fields are read;
/// without one the whole row is read. Results keep the candidate order.
pub(crate) struct Hydrator {
    ctx: Arc<CollectionContext>,
    fields: Option<Vec<String>>,
}

impl Hydrator {
    pub(crate) fn new(ctx: Arc<CollectionContext>, values: Option<&[String]>) -> Self {
        let fields = values.map(|values| {
            std::iter::once(META_FIELD.to_string())
                .chain(values.iter().cloned())
                .collect()
        });
        Self { ctx, fields }
    }

    /// Hydrates every id. Any single failure fails the whole batch.
    pub(crate) async fn hydrate(&self, ids: &[DocumentId]) -> CoreResult<Vec<Document>> {
        match self.ctx.config.hydrate_concurrency {
            Some(limit) => {
                stream::iter(ids.iter().map(|id| self.hydrate_one(id)))
                    .buffered(limit.max(1))
                    .try_collect()
                    .await
            }
            None => try_join_all(ids.iter().map(|id| self.hydrate_one(id))).await,
        }
    }

    async fn hydrate_one(&self, id: &DocumentId) -> CoreResult<Document> {
        let key = keys::document_key(&self.ctx.name, id);
        let row: Vec<(String, String)> = match &self.fields {
            Some(fields) => {
                let values = self.ctx.backend.hmget(&key, fields).await?;
                fields
                    .iter()
                    .cloned()
                    .zip(values)
                    .filter_map(|(field, value)| value.map(|value| (field, value)))
                    .collect()
            }
            None => self.ctx.backend.hgetall(&key).await?,
        };

        Document::from_row(&key, row, self.ctx.codec.as_ref()).inspect_err(|err| {
            if let CoreError::ConsistencyViolation { message, .. } = err {
                tracing::warn!(collection = %self.ctx.name, %id, %message, "dangling index entry");
            }
        })
    }
}
