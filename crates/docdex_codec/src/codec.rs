//! String codecs for field values.

use crate::error::{CodecError, CodecResult};
use crate::value::{Field, ValueKind};

/// Encodes field values to strings and back.
///
/// Implementations must round-trip scalars, arrays and objects:
/// `decode(encode(v)) == v`.
pub trait ValueCodec: Send + Sync {
    /// Encodes a value.
    fn encode(&self, value: &Field) -> CodecResult<String>;

    /// Decodes a previously encoded value.
    fn decode(&self, raw: &str) -> CodecResult<Field>;
}

/// The reference codec: compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Field) -> CodecResult<String> {
        serde_json::to_string(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
    }

    fn decode(&self, raw: &str) -> CodecResult<Field> {
        serde_json::from_str(raw).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}

/// Encodes a field for storage, returning its type tag and stored form.
///
/// Strings are stored verbatim; everything else goes through `codec`.
pub fn encode_field(codec: &dyn ValueCodec, value: &Field) -> CodecResult<(ValueKind, String)> {
    let kind = ValueKind::of(value);
    let raw = match value {
        Field::String(s) => s.clone(),
        other => codec.encode(other)?,
    };
    Ok((kind, raw))
}

/// Decodes a stored field according to its recorded type tag.
///
/// A `string` tag yields `raw` unchanged. Any other tag, unknown tags
/// included, decodes `raw` through `codec`; the tag is not required to
/// name the decoded kind.
///
/// # Errors
///
/// Fails if the codec rejects `raw`.
pub fn decode_field(codec: &dyn ValueCodec, kind: ValueKind, raw: &str) -> CodecResult<Field> {
    if kind.is_verbatim() {
        return Ok(Field::String(raw.to_string()));
    }
    codec.decode(raw)
}
