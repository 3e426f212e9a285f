//! Schema-driven message decoding.
//!
//! Decoding a message repeatedly reads a [tag](crate::wire::read_tag), reads
//! the value that follows according to the tag's wire type and stores it in
//! the record field with the tag's number, until the input is exhausted.
//!
//! - Fields whose number is not in the schema are skipped.
//! - Singular fields which occur more than once keep the last value.
//! - Repeated fields append each value in the order it occurs. Repeated
//!   numeric fields accept both the packed and unpacked encodings.
//! - Embedded messages and map entries are decoded recursively from the
//!   bytes of their length-delimited value.
//! - `any` values are decoded as the message type they name. If that type
//!   is not in the schema the value is dropped.
//!
//! Any error aborts the whole decode and no partial record is returned.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::cursor::ByteCursor;
use crate::env::{config_pairs, str_as_bool};
use crate::errors::{DecodeError, ErrorKind};
use crate::record::{MapKey, Record, Value};
use crate::schema::{
    any_message_name, FieldDescriptor, FieldType, MessageDescriptor, MessageId, ScalarType, Schema,
    ANY_TYPE_FIELD, ANY_VALUE_FIELD,
};
use crate::varint::{zigzag_decode_32, zigzag_decode_64};
use crate::wire::{read_tag, read_value, RawValue, Tag, WireType};

/// Default maximum nesting depth of embedded messages.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Name of the environment variable which overrides [`DecodeOptions`].
///
/// The value is a space-separated list of `key=value` pairs. Supported keys
/// are `recursion-limit` and `lossy-utf8`.
pub const OPTIONS_ENV_VAR: &str = "TAGWIRE_DECODE";

/// How to handle string fields which contain invalid UTF-8.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Utf8Mode {
    /// Fail with [`ErrorKind::InvalidUtf8`].
    #[default]
    Strict,

    /// Replace invalid sequences with U+FFFD.
    Lossy,
}

/// Options which customize decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeOptions {
    recursion_limit: usize,
    utf8: Utf8Mode,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            utf8: Utf8Mode::Strict,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create default options, then apply overrides from the
    /// [`TAGWIRE_DECODE`](OPTIONS_ENV_VAR) environment variable.
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        if let Some(config) = std::env::var_os(OPTIONS_ENV_VAR) {
            opts.apply_config(&config.to_string_lossy());
        }
        opts
    }

    /// Set the maximum nesting depth of embedded messages.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Set how invalid UTF-8 in string fields is handled.
    pub fn with_utf8(mut self, mode: Utf8Mode) -> Self {
        self.utf8 = mode;
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn utf8(&self) -> Utf8Mode {
        self.utf8
    }

    /// Update options from a space-separated sequence of `key=value` pairs.
    fn apply_config(&mut self, config: &str) {
        for (key, val) in config_pairs(config) {
            match key {
                "recursion-limit" => match val.parse() {
                    Ok(limit) => self.recursion_limit = limit,
                    Err(_) => warn!(value = val, "invalid recursion limit"),
                },
                "lossy-utf8" => {
                    self.utf8 = if str_as_bool(val) {
                        Utf8Mode::Lossy
                    } else {
                        Utf8Mode::Strict
                    }
                }
                _ => warn!(option = key, "unrecognized decode option"),
            }
        }
    }
}

/// Hooks which are invoked as a message is decoded.
///
/// This allows callers to collect statistics or timings without the decoder
/// depending on any particular instrumentation. All methods have empty
/// default implementations.
pub trait DecodeObserver: Sync {
    /// Called after each field has been read, at every nesting level.
    ///
    /// `known` is false if the field was skipped because its number is not in
    /// the schema.
    fn field_decoded(&self, _message: &MessageDescriptor, _tag: Tag, _known: bool) {}

    /// Called when decoding of a top-level message finishes.
    fn decode_finished(
        &self,
        _message: &MessageDescriptor,
        _input_len: usize,
        _result: Result<&Record, &DecodeError>,
    ) {
    }
}

/// Observer which does nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopObserver;

impl DecodeObserver for NoopObserver {}

impl<O: DecodeObserver + ?Sized> DecodeObserver for &O {
    fn field_decoded(&self, message: &MessageDescriptor, tag: Tag, known: bool) {
        (**self).field_decoded(message, tag, known)
    }

    fn decode_finished(
        &self,
        message: &MessageDescriptor,
        input_len: usize,
        result: Result<&Record, &DecodeError>,
    ) {
        (**self).decode_finished(message, input_len, result)
    }
}

/// Decodes messages using a schema.
///
/// A decoder holds no mutable state, so one decoder can be used for any
/// number of sequential or concurrent decode calls.
///
/// ```
/// use tagwire::{Decoder, FieldDef, MessageDef, ScalarType, Schema, SchemaDef};
///
/// let schema = Schema::build(SchemaDef::new().message(
///     MessageDef::new("Point")
///         .field(FieldDef::new("x", 1, ScalarType::Int32))
///         .field(FieldDef::new("label", 2, ScalarType::String)),
/// ))?;
///
/// let decoder = Decoder::new(&schema);
/// let point = decoder.decode("Point", &[0x08, 0xac, 0x02, 0x12, 0x02, 0x68, 0x69])?;
///
/// assert_eq!(point.get("x").and_then(|v| v.as_i64()), Some(300));
/// assert_eq!(point.get("label").and_then(|v| v.as_str()), Some("hi"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Decoder<'s, O: DecodeObserver = NoopObserver> {
    schema: &'s Schema,
    options: DecodeOptions,
    observer: O,
}

impl<'s> Decoder<'s> {
    /// Create a decoder with default options.
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            options: DecodeOptions::default(),
            observer: NoopObserver,
        }
    }
}

impl<'s, O: DecodeObserver> Decoder<'s, O> {
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the observer which is notified as messages are decoded.
    pub fn with_observer<P: DecodeObserver>(self, observer: P) -> Decoder<'s, P> {
        Decoder {
            schema: self.schema,
            options: self.options,
            observer,
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Decode a message of the type named `message` from `buf`.
    pub fn decode(&self, message: &str, buf: &[u8]) -> Result<Record, DecodeError> {
        let id = self.schema.message_id(message).ok_or_else(|| {
            DecodeError::new(ErrorKind::UnknownMessage(message.to_string()), 0)
        })?;
        self.decode_id(id, buf)
    }

    /// Decode a message of the type identified by `id` from `buf`.
    ///
    /// Fails with [`ErrorKind::UnknownMessage`] if `id` does not belong to
    /// this decoder's schema.
    pub fn decode_id(&self, id: MessageId, buf: &[u8]) -> Result<Record, DecodeError> {
        let descriptor = self.schema.get_message(id).ok_or_else(|| {
            DecodeError::new(ErrorKind::UnknownMessage(format!("{:?}", id)), 0)
        })?;
        let mut cursor = ByteCursor::new(buf);
        let result = self.decode_message(descriptor, &mut cursor, 0);

        if let Err(err) = &result {
            debug!(message_type = descriptor.name(), error = %err, "decode failed");
        }
        self.observer
            .decode_finished(descriptor, buf.len(), result.as_ref());

        result
    }

    /// Decode many independent buffers in parallel.
    ///
    /// Results are returned in the same order as `bufs`. Each buffer is
    /// decoded independently, so a failure in one does not affect the others.
    pub fn decode_batch<B: AsRef<[u8]> + Sync>(
        &self,
        message: &str,
        bufs: &[B],
    ) -> Vec<Result<Record, DecodeError>> {
        let Some(id) = self.schema.message_id(message) else {
            let err = DecodeError::new(ErrorKind::UnknownMessage(message.to_string()), 0);
            return bufs.iter().map(|_| Err(err.clone())).collect();
        };
        bufs.par_iter()
            .map(|buf| self.decode_id(id, buf.as_ref()))
            .collect()
    }

    /// Decode fields from `cursor` until it is exhausted.
    fn decode_message(
        &self,
        descriptor: &Arc<MessageDescriptor>,
        cursor: &mut ByteCursor,
        depth: usize,
    ) -> Result<Record, DecodeError> {
        if depth > self.options.recursion_limit {
            return Err(DecodeError::new(
                ErrorKind::RecursionLimitExceeded(self.options.recursion_limit),
                cursor.offset(),
            )
            .with_context(None, descriptor.name()));
        }

        let mut record = Record::new(descriptor.clone());
        while !cursor.is_empty() {
            let tag = read_tag(cursor).map_err(|err| err.with_context(None, descriptor.name()))?;
            let value_start = cursor.offset();
            let value = read_value(cursor, tag.wire_type)
                .map_err(|err| err.with_context(Some(tag.number), descriptor.name()))?;

            let Some((index, field)) = descriptor.field_by_number(tag.number) else {
                trace!(
                    message_type = descriptor.name(),
                    field = tag.number,
                    "skipping unknown field"
                );
                self.observer.field_decoded(descriptor, tag, false);
                continue;
            };

            let value_offset = content_offset(&value, value_start, cursor);
            self.apply_field(&mut record, index, field, value, value_offset, depth)
                .map_err(|err| err.with_context(Some(tag.number), descriptor.name()))?;
            self.observer.field_decoded(descriptor, tag, true);
        }

        Ok(record)
    }

    /// Store a field value in `record`.
    ///
    /// `offset` is the absolute offset of `value`'s content in the input.
    fn apply_field(
        &self,
        record: &mut Record,
        index: usize,
        field: &FieldDescriptor,
        value: RawValue,
        offset: usize,
        depth: usize,
    ) -> Result<(), DecodeError> {
        match field.field_type() {
            FieldType::Scalar(ty) => {
                if let (true, true, RawValue::Bytes(packed)) =
                    (field.is_repeated(), ty.is_packable(), value)
                {
                    return self.decode_packed(record, index, *ty, packed, offset);
                }
                let value = self.decode_scalar(*ty, value, offset)?;
                store(record, index, field, value);
            }
            FieldType::Message(id) => {
                let body = expect_bytes(value, offset)?;
                let nested = self.decode_nested(*id, body, offset, depth)?;
                store(record, index, field, Value::Message(nested));
            }
            FieldType::Map {
                key,
                value: value_type,
            } => {
                let body = expect_bytes(value, offset)?;
                let (key, value) = self.decode_map_entry(*key, value_type, body, offset, depth)?;
                record.insert_at(index, key, value);
            }
            FieldType::Any => {
                let body = expect_bytes(value, offset)?;
                if let Some(nested) = self.decode_any(body, offset, depth)? {
                    store(record, index, field, Value::Message(nested));
                }
            }
        }
        Ok(())
    }

    /// Decode an `any` value, whose fields are a type name and the encoded
    /// message.
    ///
    /// Returns `None` if the type name is missing or not in the schema.
    fn decode_any(
        &self,
        body: &[u8],
        offset: usize,
        depth: usize,
    ) -> Result<Option<Record>, DecodeError> {
        let mut type_name = None;
        let mut payload: Option<(&[u8], usize)> = None;

        let mut cursor = ByteCursor::sub_cursor(body, offset);
        while !cursor.is_empty() {
            let tag = read_tag(&mut cursor)?;
            let raw_start = cursor.offset();
            let raw = read_value(&mut cursor, tag.wire_type)?;
            let raw_offset = content_offset(&raw, raw_start, &cursor);

            match tag.number {
                ANY_TYPE_FIELD => {
                    let name = expect_bytes(raw, raw_offset)?;
                    type_name = Some(self.decode_string(name, raw_offset)?);
                }
                ANY_VALUE_FIELD => payload = Some((expect_bytes(raw, raw_offset)?, raw_offset)),
                _ => {}
            }
        }

        let type_name = type_name.unwrap_or_default();
        let Some(id) = self.schema.message_id(any_message_name(&type_name)) else {
            trace!(type_name = type_name.as_str(), "skipping any value of unknown type");
            return Ok(None);
        };
        let (payload, payload_offset) = payload.unwrap_or((&[][..], cursor.offset()));
        self.decode_nested(id, payload, payload_offset, depth).map(Some)
    }

    fn decode_nested(
        &self,
        id: MessageId,
        body: &[u8],
        offset: usize,
        depth: usize,
    ) -> Result<Record, DecodeError> {
        let descriptor = self.schema.message_by_id(id);
        let mut cursor = ByteCursor::sub_cursor(body, offset);
        self.decode_message(descriptor, &mut cursor, depth + 1)
    }

    /// Convert a raw value into a value of scalar type `ty`.
    fn decode_scalar(
        &self,
        ty: ScalarType,
        value: RawValue,
        offset: usize,
    ) -> Result<Value, DecodeError> {
        let value = match (ty, value) {
            (ScalarType::Int32, RawValue::Varint(v)) => Value::I32(v as i32),
            (ScalarType::Int64, RawValue::Varint(v)) => Value::I64(v as i64),
            (ScalarType::Uint32, RawValue::Varint(v)) => Value::U32(v as u32),
            (ScalarType::Uint64, RawValue::Varint(v)) => Value::U64(v),
            (ScalarType::Sint32, RawValue::Varint(v)) => Value::I32(zigzag_decode_32(v as u32)),
            (ScalarType::Sint64, RawValue::Varint(v)) => Value::I64(zigzag_decode_64(v)),
            (ScalarType::Bool, RawValue::Varint(v)) => Value::Bool(v != 0),
            (ScalarType::Enum, RawValue::Varint(v)) => Value::Enum(v as i32),
            (ScalarType::Fixed32, RawValue::Fixed32(v)) => Value::U32(v),
            (ScalarType::Sfixed32, RawValue::Fixed32(v)) => Value::I32(v as i32),
            (ScalarType::Float, RawValue::Fixed32(v)) => Value::F32(f32::from_bits(v)),
            (ScalarType::Fixed64, RawValue::Fixed64(v)) => Value::U64(v),
            (ScalarType::Sfixed64, RawValue::Fixed64(v)) => Value::I64(v as i64),
            (ScalarType::Double, RawValue::Fixed64(v)) => Value::F64(f64::from_bits(v)),
            (ScalarType::String, RawValue::Bytes(b)) => Value::String(self.decode_string(b, offset)?),
            (ScalarType::Bytes, RawValue::Bytes(b)) => Value::Bytes(b.to_vec()),
            (ty, value) => {
                return Err(wire_type_mismatch(ty.wire_type(), value.wire_type(), offset));
            }
        };
        Ok(value)
    }

    fn decode_string(&self, bytes: &[u8], offset: usize) -> Result<String, DecodeError> {
        match self.options.utf8 {
            Utf8Mode::Strict => std::str::from_utf8(bytes)
                .map(|s| s.to_string())
                .map_err(|err| {
                    DecodeError::new(ErrorKind::InvalidUtf8, offset + err.valid_up_to())
                }),
            Utf8Mode::Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Decode a packed run of numeric values and append them to the repeated
    /// field at `index`.
    fn decode_packed(
        &self,
        record: &mut Record,
        index: usize,
        ty: ScalarType,
        packed: &[u8],
        offset: usize,
    ) -> Result<(), DecodeError> {
        let wire_type = ty.wire_type();
        if let Some(element_size) = wire_type.fixed_size() {
            if packed.len() % element_size != 0 {
                return Err(DecodeError::new(
                    ErrorKind::PackedLengthMismatch {
                        len: packed.len(),
                        element_size,
                    },
                    offset,
                ));
            }
        }

        let mut cursor = ByteCursor::sub_cursor(packed, offset);
        while !cursor.is_empty() {
            let element_offset = cursor.offset();
            let raw = read_value(&mut cursor, wire_type)?;
            let value = self.decode_scalar(ty, raw, element_offset)?;
            record.push_at(index, value);
        }
        Ok(())
    }

    /// Decode the key and value of a map entry.
    ///
    /// A missing key or value takes the default for its type. If the key or
    /// value occurs more than once, the last occurrence wins.
    fn decode_map_entry(
        &self,
        key_type: ScalarType,
        value_type: &FieldType,
        body: &[u8],
        offset: usize,
        depth: usize,
    ) -> Result<(MapKey, Value), DecodeError> {
        let mut key = None;
        let mut value = None;

        let mut cursor = ByteCursor::sub_cursor(body, offset);
        while !cursor.is_empty() {
            let tag = read_tag(&mut cursor)?;
            let raw_start = cursor.offset();
            let raw = read_value(&mut cursor, tag.wire_type)?;
            let raw_offset = content_offset(&raw, raw_start, &cursor);

            match tag.number {
                MAP_KEY_FIELD => key = Some(self.decode_scalar(key_type, raw, raw_offset)?),
                MAP_VALUE_FIELD => {
                    value = Some(match value_type {
                        FieldType::Scalar(ty) => self.decode_scalar(*ty, raw, raw_offset)?,
                        FieldType::Message(id) => {
                            let body = expect_bytes(raw, raw_offset)?;
                            Value::Message(self.decode_nested(*id, body, raw_offset, depth)?)
                        }
                        // Rejected when the schema is built.
                        FieldType::Map { .. } | FieldType::Any => {
                            return Err(wire_type_mismatch(
                                WireType::LengthDelimited,
                                raw.wire_type(),
                                raw_offset,
                            ));
                        }
                    });
                }
                _ => {}
            }
        }

        let key = key.unwrap_or_else(|| key_type.default_value());
        let key = MapKey::from_value(key)
            .ok_or_else(|| wire_type_mismatch(key_type.wire_type(), WireType::LengthDelimited, offset))?;
        let value = match value {
            Some(value) => value,
            None => match value_type {
                FieldType::Scalar(ty) => ty.default_value(),
                FieldType::Message(id) => {
                    Value::Message(Record::new(self.schema.message_by_id(*id).clone()))
                }
                // Rejected when the schema is built.
                FieldType::Map { .. } | FieldType::Any => Value::Map(Default::default()),
            },
        };
        Ok((key, value))
    }
}

/// Field number of the key in a map entry.
const MAP_KEY_FIELD: u32 = 1;

/// Field number of the value in a map entry.
const MAP_VALUE_FIELD: u32 = 2;

/// Return the offset of the first byte of a value's content.
///
/// `start` is the offset of the value. For length-delimited values this skips
/// the length prefix.
fn content_offset(value: &RawValue, start: usize, cursor: &ByteCursor) -> usize {
    match value {
        RawValue::Bytes(bytes) => cursor.offset() - bytes.len(),
        _ => start,
    }
}

fn store(record: &mut Record, index: usize, field: &FieldDescriptor, value: Value) {
    if field.is_repeated() {
        record.push_at(index, value);
    } else {
        record.set_at(index, value);
    }
}

fn expect_bytes(value: RawValue, offset: usize) -> Result<&[u8], DecodeError> {
    match value {
        RawValue::Bytes(bytes) => Ok(bytes),
        other => Err(wire_type_mismatch(
            WireType::LengthDelimited,
            other.wire_type(),
            offset,
        )),
    }
}

fn wire_type_mismatch(expected: WireType, actual: WireType, offset: usize) -> DecodeError {
    DecodeError::new(ErrorKind::WireTypeMismatch { expected, actual }, offset)
}

/// Decode a message of the type named `message` from `buf` with default
/// options.
///
/// See [`Decoder`] for decoding with custom options or an observer.
pub fn decode(schema: &Schema, message: &str, buf: &[u8]) -> Result<Record, DecodeError> {
    Decoder::new(schema).decode(message, buf)
}
