//! Secondary indexes.
//!
//! Indexes are created through a [`crate::Collection`], which subscribes
//! them to its lifecycle events. From then on every write stages the
//! index's maintenance on the same transaction as the primary row, so an
//! index never observes a partially applied write.
//!
//! # Index Types
//!
//! - [`TermIndex`]: exact match on a tuple of field values
//! - [`RangeIndex`]: inclusive numeric range over one field
//!
//! Queries go straight to the index and bypass the collection.

mod hydrate;
mod range;
mod term;
mod traits;

pub use range::{RangeIndex, RangeIndexConfig};
pub use term::{TermIndex, TermIndexConfig};
pub use traits::SecondaryIndex;

pub(crate) use traits::subscribe;
