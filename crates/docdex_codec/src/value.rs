//! Schemaless field values and their type tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A schemaless field value.
///
/// Scalars (string, number, boolean, null) or a recursively nested
/// array/object of fields.
pub type Field = serde_json::Value;

/// A document's user data: field name to value.
pub type Data = serde_json::Map<String, Field>;

/// The kind of value a field held when it was last written.
///
/// Backends store only strings, so every stored field carries one of
/// these tags in the document metadata. Decoding dispatches on the tag,
/// never on the shape of the stored string.
///
/// Tags are read leniently: a tag outside this vocabulary parses as
/// [`ValueKind::Unknown`] and is decoded structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueKind {
    /// UTF-8 text, stored verbatim.
    String,
    /// Integer or floating-point number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Explicit null.
    Null,
    /// Ordered sequence of fields.
    Array,
    /// Nested mapping of fields.
    Object,
    /// A tag written by another producer. Never returned by [`ValueKind::of`].
    Unknown,
}

impl ValueKind {
    /// Returns the kind of `value`.
    #[must_use]
    pub fn of(value: &Field) -> Self {
        match value {
            Field::String(_) => Self::String,
            Field::Number(_) => Self::Number,
            Field::Bool(_) => Self::Boolean,
            Field::Null => Self::Null,
            Field::Array(_) => Self::Array,
            Field::Object(_) => Self::Object,
        }
    }

    /// Returns the tag as stored in metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Array => "array",
            Self::Object => "object",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a stored tag. Unrecognised tags map to [`ValueKind::Unknown`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => Self::Unknown,
        }
    }

    /// Returns true for values stored verbatim rather than encoded.
    #[must_use]
    pub const fn is_verbatim(self) -> bool {
        matches!(self, Self::String)
    }
}

impl From<String> for ValueKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<ValueKind> for String {
    fn from(kind: ValueKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest magnitude below which every integral `f64` is exact.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Returns the string form of a value used for term hashing.
///
/// Strings contribute their text unchanged; every other value contributes
/// its compact JSON form (`42`, `true`, `null`, `[1,2]`, `{"a":1}`).
/// Integral floats take their integer form, so `1.0` and `1` share a
/// bucket.
#[must_use]
pub fn term_string(value: &Field) -> String {
    match value {
        Field::String(s) => s.clone(),
        Field::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < EXACT_INTEGER_LIMIT => {
                #[allow(clippy::cast_possible_truncation)]
                let int = f as i64;
                int.to_string()
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
