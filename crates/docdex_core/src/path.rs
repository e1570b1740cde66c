//! Dot-separated field paths into nested document data.

use crate::error::{CoreError, CoreResult};
use docdex_codec::{Data, Field};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A validated dot-separated path such as `address.city`.
///
/// Resolution walks nested objects one segment at a time. Arrays are
/// leaves: a segment never indexes into a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

/// A path segment was absent while resolving a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {segment:?} of path {path:?} is missing")]
pub struct MissingField {
    /// The full path being resolved.
    pub path: String,
    /// The first segment that could not be found.
    pub segment: String,
}

impl FieldPath {
    /// Parses a dot-separated path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] for an empty path or a path
    /// with an empty segment (`a..b`, `.a`, `a.`).
    pub fn parse(raw: &str) -> CoreResult<Self> {
        if raw.is_empty() {
            return Err(CoreError::invalid_path(raw, "path is empty"));
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(CoreError::invalid_path(raw, "path has an empty segment"));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Returns the path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the individual segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolves the path against `data`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingField`] naming the first segment that is absent,
    /// or that would have to be looked up inside a non-object value.
    pub fn resolve<'a>(&self, data: &'a Data) -> Result<&'a Field, MissingField> {
        let (first, rest) = self
            .segments
            .split_first()
            .ok_or_else(|| self.missing(""))?;
        let mut current = data.get(first).ok_or_else(|| self.missing(first))?;
        for segment in rest {
            current = current
                .as_object()
                .and_then(|object| object.get(segment))
                .ok_or_else(|| self.missing(segment))?;
        }
        Ok(current)
    }

    fn missing(&self, segment: &str) -> MissingField {
        MissingField {
            path: self.raw.clone(),
            segment: segment.to_string(),
        }
    }
}

impl FromStr for FieldPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Data {
        json!({
            "name": "Ann",
            "address": {"city": "Berlin", "geo": {"lat": 52.5}},
            "tags": ["a"],
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn parse_valid() {
        let path: FieldPath = "address.geo.lat".parse().unwrap();
        assert_eq!(path.segments(), ["address", "geo", "lat"]);
        assert_eq!(path.to_string(), "address.geo.lat");
    }

    #[test]
    fn parse_rejects_empty_segments() {
        for raw in ["", ".", "a..b", ".a", "a."] {
            let err = FieldPath::parse(raw).unwrap_err();
            assert!(matches!(err, CoreError::InvalidPath { .. }), "{raw:?}");
        }
    }

    #[test]
    fn resolve_top_level_and_nested() {
        let data = data();
        let name = FieldPath::parse("name").unwrap();
        let lat = FieldPath::parse("address.geo.lat").unwrap();
        assert_eq!(name.resolve(&data).unwrap(), &json!("Ann"));
        assert_eq!(lat.resolve(&data).unwrap(), &json!(52.5));
    }

    #[test]
    fn resolve_reports_missing_segment() {
        let data = data();
        let path = FieldPath::parse("address.zip").unwrap();
        let missing = path.resolve(&data).unwrap_err();
        assert_eq!(missing.segment, "zip");
        assert_eq!(missing.path, "address.zip");
    }

    #[test]
    fn resolve_does_not_walk_into_scalars_or_arrays() {
        let data = data();
        assert!(FieldPath::parse("name.first").unwrap().resolve(&data).is_err());
        assert!(FieldPath::parse("tags.0").unwrap().resolve(&data).is_err());
    }
}
