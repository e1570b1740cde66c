//! Documents, metadata and their flat row layout.

use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use docdex_codec::{decode_field, encode_field, CodecError, Data, Field, ValueCodec, ValueKind};
use docdex_storage::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Row field holding the JSON-encoded [`Meta`].
///
/// Reserved: user data may not contain a field with this name.
pub const META_FIELD: &str = "_meta";

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Per-document bookkeeping carried alongside user data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Document id.
    pub id: DocumentId,
    /// Last-write timestamp, milliseconds since the Unix epoch.
    pub ts: u64,
    /// Value kind of each field as of the write that last set it.
    pub types: BTreeMap<String, ValueKind>,
}

impl Meta {
    /// Builds metadata for freshly written `data`.
    #[must_use]
    pub fn for_data(id: DocumentId, ts: u64, data: &Data) -> Self {
        let types = data
            .iter()
            .map(|(field, value)| (field.clone(), ValueKind::of(value)))
            .collect();
        Self { id, ts, types }
    }
}

/// A schemaless document: user data plus [`Meta`].
///
/// Query results may carry only a projection of the data; `meta` is
/// always complete.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// User fields.
    pub data: Data,
    /// Bookkeeping.
    pub meta: Meta,
}

impl Document {
    /// Returns the document id.
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.meta.id
    }

    /// Returns a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Field> {
        self.data.get(field)
    }

    /// Shallow-merges `partial` over this document.
    ///
    /// Type tags are recomputed for merged keys only; tags of untouched
    /// fields are left as they are.
    pub fn merge(&mut self, partial: Data) {
        for (field, value) in partial {
            self.meta.types.insert(field.clone(), ValueKind::of(&value));
            self.data.insert(field, value);
        }
    }

    /// Encodes the document into its flat row.
    ///
    /// Strings are stored verbatim, other values through `codec`, and the
    /// metadata as JSON under [`META_FIELD`].
    pub fn to_row(&self, codec: &dyn ValueCodec) -> CoreResult<Row> {
        let mut row = Row::new();
        for (field, value) in &self.data {
            let (_, raw) = encode_field(codec, value)?;
            row.insert(field.clone(), raw);
        }
        let meta = serde_json::to_string(&self.meta)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        row.insert(META_FIELD.to_string(), meta);
        Ok(row)
    }

    /// Decodes a (possibly partial) row read from `key`.
    ///
    /// Every field is decoded according to its recorded tag. A row without
    /// [`META_FIELD`] cannot be decoded and is a consistency violation.
    pub fn from_row<I>(key: &str, row: I, codec: &dyn ValueCodec) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw_meta = None;
        let mut raw_fields = Vec::new();
        for (field, value) in row {
            if field == META_FIELD {
                raw_meta = Some(value);
            } else {
                raw_fields.push((field, value));
            }
        }

        let Some(raw_meta) = raw_meta else {
            let message = if raw_fields.is_empty() {
                "primary row is missing"
            } else {
                "row has no metadata"
            };
            return Err(CoreError::consistency_violation(key, message));
        };
        let meta: Meta = serde_json::from_str(&raw_meta)
            .map_err(|e| CodecError::decoding_failed(format!("{key}: {e}")))?;

        let mut data = Data::new();
        for (field, raw) in raw_fields {
            let value = match meta.types.get(&field) {
                Some(kind) => decode_field(codec, *kind, &raw)?,
                None => codec.decode(&raw)?,
            };
            data.insert(field, value);
        }
        Ok(Self { data, meta })
    }
}
