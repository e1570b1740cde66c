//! # docdex Codec
//!
//! Value encoding and type tags for docdex.
//!
//! Storage backends hold only strings. This crate defines the schemaless
//! [`Field`] value, the [`ValueKind`] tag recorded for every stored field,
//! and the [`ValueCodec`] that turns non-string values into strings and
//! back. The reference codec is [`JsonCodec`].
//!
//! ## Storage Rules
//!
//! - Strings are stored verbatim
//! - Every other kind is stored through the codec
//! - Decoding dispatches on the recorded tag only
//!
//! ## Usage
//!
//! ```
//! use docdex_codec::{decode_field, encode_field, JsonCodec, ValueKind};
//! use serde_json::json;
//!
//! let (kind, raw) = encode_field(&JsonCodec, &json!([1, 2])).unwrap();
//! assert_eq!(kind, ValueKind::Array);
//! assert_eq!(decode_field(&JsonCodec, kind, &raw).unwrap(), json!([1, 2]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod value;

pub use codec::{decode_field, encode_field, JsonCodec, ValueCodec};
pub use error::{CodecError, CodecResult};
pub use value::{term_string, Data, Field, ValueKind};
