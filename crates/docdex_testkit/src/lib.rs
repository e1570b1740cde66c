//! # docdex Testkit
//!
//! Test utilities for docdex.
//!
//! This crate provides:
//! - Collection fixtures on the in-memory backend
//! - Property-based test generators using proptest
//! - A fault-injecting backend wrapper for atomicity tests
//! - Tracing setup for test runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docdex_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn finds_ann() {
//!     init_tracing();
//!     let scenario = UsersScenario::new().await;
//!     let found = scenario.by_city.match_terms(&obj(json!({"city": "Berlin"}))).await?;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber.
///
/// Honours `RUST_LOG` and defaults to `warn`. Safe to call from every
/// test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
