//! Test fixtures and collection helpers.
//!
//! Provides in-memory collections and the canonical users/by_city
//! scenario used across the integration tests.

use docdex_codec::Data;
use docdex_core::{Collection, DocumentId, IdGenerator, TermIndex, TermIndexConfig};
use docdex_storage::InMemoryBackend;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Converts a JSON object literal into document data.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn obj(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Opens collection `name` on a fresh in-memory backend.
///
/// The backend handle is returned too, for inspecting raw keys.
pub fn memory_collection(name: &str) -> (InMemoryBackend, Collection) {
    let backend = InMemoryBackend::new();
    let collection =
        Collection::new(name, Arc::new(backend.clone())).expect("Failed to open collection");
    (backend, collection)
}

/// Deterministic ids: `document_1`, `document_2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> DocumentId {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        DocumentId::new(format!("document_{n}"))
    }
}

/// Collection `users` with term index `by_city` on `city` projecting
/// `name`, holding Ann in Berlin and Bo in Paris.
pub struct UsersScenario {
    /// Raw backend.
    pub backend: InMemoryBackend,
    /// The `users` collection.
    pub users: Collection,
    /// The `by_city` index.
    pub by_city: TermIndex,
    /// Id of Ann.
    pub ann: DocumentId,
    /// Id of Bo.
    pub bo: DocumentId,
}

impl UsersScenario {
    /// Builds the scenario.
    ///
    /// # Panics
    ///
    /// Panics if any setup write fails.
    pub async fn new() -> Self {
        let (backend, users) = memory_collection("users");
        let by_city = users
            .term_index(TermIndexConfig::new("by_city", ["city"]).values(["name"]))
            .expect("Failed to create by_city index");
        let ann = users
            .create(obj(json!({"name": "Ann", "city": "Berlin"})))
            .await
            .expect("Failed to create Ann");
        let bo = users
            .create(obj(json!({"name": "Bo", "city": "Paris"})))
            .await
            .expect("Failed to create Bo");
        Self {
            backend,
            users,
            by_city,
            ann,
            bo,
        }
    }
}
