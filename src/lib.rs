//! tagwire decodes and encodes tag-delimited binary messages using a schema.
//!
//! The wire format is the one used by Protocol Buffers. A message is a
//! sequence of fields. Each field starts with a tag that holds the field
//! number and a wire type, followed by a value laid out according to that
//! wire type. The message has no header or overall length.
//!
//! # Decoding messages
//!
//! The basic workflow is:
//!
//! 1. Describe the message types with a [`Schema`]. Build it in code from a
//!    [`SchemaDef`], load a JSON document with [`Schema::from_json`] or load
//!    a `protoc` descriptor set with [`Schema::from_descriptor_set`].
//! 2. Decode a buffer with [`decode()`], or with a [`Decoder`] if you need
//!    custom [`DecodeOptions`] or a [`DecodeObserver`].
//! 3. Read field values from the resulting [`Record`] by name or number.
//!
//! ```
//! use tagwire::{decode, Schema};
//!
//! let schema = Schema::from_json(r#"{
//!   "messages": [{
//!     "name": "User",
//!     "fields": [
//!       { "name": "id", "number": 1, "type": "int64" },
//!       { "name": "name", "number": 2, "type": "string" }
//!     ]
//!   }]
//! }"#)?;
//!
//! let user = decode(&schema, "User", &[0x08, 0xac, 0x02, 0x12, 0x02, 0x68, 0x69])?;
//! assert_eq!(user.get("id").and_then(|v| v.as_i64()), Some(300));
//! assert_eq!(user.get("name").and_then(|v| v.as_str()), Some("hi"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Decoding is all-or-nothing. Malformed input produces a [`DecodeError`]
//! with the offset of the problem. A partially decoded record is never
//! returned. Fields whose numbers are not in the schema are skipped, so
//! messages written with a newer schema can be read with an older one.
//!
//! ## Threading
//!
//! A [`Schema`] is immutable once built and decoding does not mutate shared
//! state, so one schema can serve any number of threads.
//! [`Decoder::decode_batch`] decodes many buffers in parallel using Rayon's
//! global thread pool.
//!
//! # Encoding and JSON
//!
//! [`encode()`] converts a record back into bytes. The [`json`] module
//! converts records to and from JSON, which the `tagwire` CLI uses to print
//! decoded messages.
//!
//! # Configuration
//!
//! [`DecodeOptions::from_env`] reads overrides from the `TAGWIRE_DECODE`
//! environment variable. Its value is a space-separated list of `key=value`
//! pairs:
//!
//! - `recursion-limit=N` sets the maximum nesting depth of embedded messages
//! - `lossy-utf8=<bool>` replaces invalid UTF-8 in strings instead of
//!   failing
//!
//! # Logging
//!
//! The library emits [tracing](https://docs.rs/tracing) events at the
//! `debug` and `trace` levels. It does not install a subscriber.

mod cursor;
mod decode;
mod descriptor;
mod encode;
mod env;
mod errors;
mod record;
mod schema;
mod varint;
mod wire;

pub mod json;

pub use cursor::ByteCursor;
pub use decode::{
    decode, DecodeObserver, DecodeOptions, Decoder, NoopObserver, Utf8Mode,
    DEFAULT_RECURSION_LIMIT, OPTIONS_ENV_VAR,
};
pub use encode::{encode, encode_into};
pub use errors::{DecodeError, EncodeError, ErrorKind, SchemaError};
pub use json::{JsonError, JsonOptions};
pub use record::{MapKey, Record, Value};
pub use schema::{
    FieldDef, FieldDescriptor, FieldType, MessageDef, MessageDescriptor, MessageId, ScalarType,
    Schema, SchemaDef, TypeName,
};
pub use varint::{
    decode_varint, encode_varint, varint_len, zigzag_decode_32, zigzag_decode_64,
    zigzag_encode_32, zigzag_encode_64, VarintError, MAX_VARINT_LEN,
};
pub use wire::{encode_tag, read_tag, read_value, RawValue, Tag, WireType, MAX_FIELD_NUMBER};
