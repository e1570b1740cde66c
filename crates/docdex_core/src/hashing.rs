//! Canonical term fingerprints.
//!
//! A fingerprint identifies one exact tuple of (path, value) pairs. Pairs
//! are sorted by path, then each path's bytes and its value's string form
//! are fed to SHA-256 in that order, and the digest is hex-encoded.
//! Indexing a document and evaluating a match query use this same
//! function, so declaration order never matters.

use docdex_codec::{term_string, Field};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Computes the fingerprint of a set of (path, value) pairs.
///
/// If a path appears more than once, the last value wins.
pub fn term_fingerprint<'a, I>(terms: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Field)>,
{
    let sorted: BTreeMap<&str, &Field> = terms.into_iter().collect();

    let mut hasher = Sha256::new();
    for (path, value) in sorted {
        hasher.update(path.as_bytes());
        hasher.update(term_string(value).as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
