//! # docdex Core
//!
//! Secondary indexing for schemaless documents on a row/set/sorted-set
//! backend.
//!
//! This crate provides:
//! - [`Collection`]: document CRUD driving one atomic transaction per write
//! - [`EventBus`]: per-collection lifecycle events consumed by indexes
//! - [`TermIndex`]: exact match on a tuple of field values
//! - [`RangeIndex`]: inclusive numeric ranges over one field
//!
//! ## Consistency
//!
//! Every create, update or delete stages its primary row change and the
//! maintenance of every live index on a single transaction, committed
//! once. Each index keeps a forward record per document, so stale
//! entries are located and cleared without recomputing old values.
//!
//! ## Storage Layout
//!
//! ```text
//! collection:<c>:<id>                          document row
//! collection:<c>:index:<name>:forward:<id>     term hashes of <id>
//! collection:<c>:index:<name>:reverse:<hash>   ids sharing <hash>
//! collection:<c>:range:<path>                  ids scored by value
//! collection:<c>:range:<path>:forward:<id>     current score of <id>
//! ```
//!
//! ## Example
//!
//! ```
//! use docdex_core::{Collection, RangeIndexConfig};
//! use docdex_storage::InMemoryBackend;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let players = Collection::new("players", Arc::new(InMemoryBackend::new())).unwrap();
//! let by_score = players
//!     .range_index(RangeIndexConfig::new("by_score", "score"))
//!     .unwrap();
//!
//! for score in [1, 5, 10] {
//!     let data = json!({"score": score});
//!     players.create(data.as_object().cloned().unwrap()).await.unwrap();
//! }
//!
//! let hits = by_score.range(2.0, 10.0).await.unwrap();
//! assert_eq!(hits.len(), 2);
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod document;
mod error;
mod events;
mod hashing;
mod index;
mod keys;
mod path;

pub use collection::Collection;
pub use config::{Config, DEFAULT_ID_PREFIX};
pub use document::{now_millis, Document, DocumentId, IdGenerator, Meta, UuidGenerator, META_FIELD};
pub use error::{CoreError, CoreResult};
pub use events::{Event, EventBus, EventHandler, Subscription};
pub use hashing::term_fingerprint;
pub use index::{RangeIndex, RangeIndexConfig, SecondaryIndex, TermIndex, TermIndexConfig};
pub use keys::{
    document_key, range_forward_key, range_key, term_forward_key, term_reverse_key,
};
pub use path::{FieldPath, MissingField};

pub use docdex_codec::{Data, Field, ValueKind};
