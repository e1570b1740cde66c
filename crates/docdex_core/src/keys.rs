//! Storage key layout.
//!
//! Every key is a colon-joined sequence of segments rooted at
//! [`ROOT`]. The layout is shared with other clients of the same backend
//! and must not change.

use crate::document::DocumentId;

/// First segment of every key.
pub const ROOT: &str = "collection";

/// `collection:<collection>:<id>`
#[must_use]
pub fn document_key(collection: &str, id: &DocumentId) -> String {
    format!("{ROOT}:{collection}:{id}")
}

/// Prefix shared by the forward and reverse sets of one term index.
#[must_use]
pub fn term_namespace(name: &str) -> String {
    format!("index:{name}")
}

/// `collection:<collection>:index:<name>:forward:<id>`
#[must_use]
pub fn term_forward_key(collection: &str, name: &str, id: &DocumentId) -> String {
    format!("{ROOT}:{collection}:index:{name}:forward:{id}")
}

/// `collection:<collection>:index:<name>:reverse:<hash>`
#[must_use]
pub fn term_reverse_key(collection: &str, name: &str, hash: &str) -> String {
    format!("{ROOT}:{collection}:index:{name}:reverse:{hash}")
}

/// Prefix shared by the ordered set and forward records of one range index.
#[must_use]
pub fn range_namespace(path: &str) -> String {
    format!("range:{path}")
}

/// `collection:<collection>:range:<path>`
#[must_use]
pub fn range_key(collection: &str, path: &str) -> String {
    format!("{ROOT}:{collection}:range:{path}")
}

/// `collection:<collection>:range:<path>:forward:<id>`
#[must_use]
pub fn range_forward_key(collection: &str, path: &str, id: &DocumentId) -> String {
    format!("{ROOT}:{collection}:range:{path}:forward:{id}")
}
