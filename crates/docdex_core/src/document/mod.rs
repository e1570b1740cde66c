//! Document types, identity and row layout.

mod id;
mod model;

pub use id::{DocumentId, IdGenerator, UuidGenerator};
pub use model::{now_millis, Document, Meta, META_FIELD};
