//! # docdex Storage
//!
//! Storage backend contract and reference implementation for docdex.
//!
//! This crate provides the lowest-level storage abstraction for docdex.
//! Backends are **opaque string stores** offering three value shapes -
//! hash rows, sets and scored sets - plus atomic transaction batches. They
//! do not interpret the strings they store.
//!
//! ## Design Principles
//!
//! - Backends expose a narrow, Redis-like primitive set
//! - Writes go through a [`Transaction`] and become visible on commit only
//! - A commit is all-or-nothing
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and embedded use

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod transaction;

pub use backend::{Row, StorageBackend, Transaction};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use transaction::{TransactionState, WriteBatch, WriteOp};
