//! Encoding records into the binary wire format.
//!
//! The encoder is the inverse of [`decode`](crate::decode()). Fields are
//! written in schema order. Repeated numeric fields are written as a single
//! packed run if the field is [packed](crate::FieldDescriptor::is_packed).
//! Singular fields which have a value are always written, even if the value
//! is the default for the field's type.
//!
//! `any` fields are written with the bare message name as the type name.

use crate::errors::EncodeError;
use crate::record::{MapKey, Record, Value};
use crate::schema::{FieldDescriptor, FieldType, ScalarType, Schema, ANY_TYPE_FIELD, ANY_VALUE_FIELD};
use crate::varint::{encode_varint, zigzag_encode_32, zigzag_encode_64};
use crate::wire::{encode_tag, WireType};

/// Encode a record into a new buffer.
pub fn encode(schema: &Schema, record: &Record) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    encode_into(schema, record, &mut out)?;
    Ok(out)
}

/// Encode a record and append the result to `out`.
///
/// If encoding fails, `out` may contain a partially encoded message.
pub fn encode_into(schema: &Schema, record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    Encoder { schema, record }.encode_fields(out)
}

struct Encoder<'a> {
    schema: &'a Schema,
    record: &'a Record,
}

impl Encoder<'_> {
    fn type_mismatch(&self, field: &FieldDescriptor) -> EncodeError {
        EncodeError::TypeMismatch {
            message: self.record.message_name().to_string(),
            field: field.name().to_string(),
        }
    }

    fn encode_fields(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        for (field, value) in self.record.fields() {
            match (field.field_type(), value) {
                (FieldType::Map { key, value: value_type }, Value::Map(entries)) => {
                    for (entry_key, entry_value) in entries {
                        let mut entry = Vec::new();
                        self.encode_map_key(field, *key, entry_key, &mut entry)?;
                        self.encode_single(field, 2, value_type, entry_value, &mut entry)?;
                        write_length_delimited(field.number(), &entry, out);
                    }
                }
                (FieldType::Map { .. }, _) => return Err(self.type_mismatch(field)),
                (field_type, Value::List(items)) if field.is_repeated() => {
                    if field.is_packed() && !items.is_empty() {
                        let FieldType::Scalar(ty) = field_type else {
                            return Err(self.type_mismatch(field));
                        };
                        let mut packed = Vec::new();
                        for item in items {
                            self.encode_scalar(field, *ty, item, &mut packed)?;
                        }
                        write_length_delimited(field.number(), &packed, out);
                    } else {
                        for item in items {
                            self.encode_single(field, field.number(), field_type, item, out)?;
                        }
                    }
                }
                (_, _) if field.is_repeated() => return Err(self.type_mismatch(field)),
                (field_type, value) => {
                    self.encode_single(field, field.number(), field_type, value, out)?;
                }
            }
        }
        Ok(())
    }

    /// Write a tag with number `number` followed by a single value of type
    /// `field_type`.
    fn encode_single(
        &self,
        field: &FieldDescriptor,
        number: u32,
        field_type: &FieldType,
        value: &Value,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        match (field_type, value) {
            (FieldType::Scalar(ty), value) => {
                encode_tag(number, ty.wire_type(), out);
                self.encode_scalar(field, *ty, value, out)
            }
            (FieldType::Message(id), Value::Message(nested)) => {
                let expected = self.schema.message_by_id(*id);
                if expected.name() != nested.message_name() {
                    return Err(EncodeError::MessageMismatch {
                        field: field.name().to_string(),
                        expected: expected.name().to_string(),
                        actual: nested.message_name().to_string(),
                    });
                }
                let body = encode(self.schema, nested)?;
                write_length_delimited(number, &body, out);
                Ok(())
            }
            (FieldType::Any, Value::Message(nested)) => {
                let name = nested.message_name();
                if self.schema.message(name).is_none() {
                    return Err(EncodeError::UnknownMessage(name.to_string()));
                }
                let mut any = Vec::new();
                encode_tag(ANY_TYPE_FIELD, WireType::LengthDelimited, &mut any);
                write_bytes(name.as_bytes(), &mut any);
                write_length_delimited(ANY_VALUE_FIELD, &encode(self.schema, nested)?, &mut any);
                write_length_delimited(number, &any, out);
                Ok(())
            }
            _ => Err(self.type_mismatch(field)),
        }
    }

    fn encode_map_key(
        &self,
        field: &FieldDescriptor,
        ty: ScalarType,
        key: &MapKey,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        encode_tag(1, ty.wire_type(), out);
        self.encode_scalar(field, ty, &key.to_value(), out)
    }

    /// Write the untagged encoding of a scalar value.
    fn encode_scalar(
        &self,
        field: &FieldDescriptor,
        ty: ScalarType,
        value: &Value,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        match (ty, value) {
            // Negative int32 values are sign-extended to 64 bits.
            (ScalarType::Int32, Value::I32(x)) => encode_varint(*x as i64 as u64, out),
            (ScalarType::Int64, Value::I64(x)) => encode_varint(*x as u64, out),
            (ScalarType::Uint32, Value::U32(x)) => encode_varint(*x as u64, out),
            (ScalarType::Uint64, Value::U64(x)) => encode_varint(*x, out),
            (ScalarType::Sint32, Value::I32(x)) => encode_varint(zigzag_encode_32(*x) as u64, out),
            (ScalarType::Sint64, Value::I64(x)) => encode_varint(zigzag_encode_64(*x), out),
            (ScalarType::Bool, Value::Bool(x)) => encode_varint(*x as u64, out),
            (ScalarType::Enum, Value::Enum(x)) => encode_varint(*x as i64 as u64, out),
            (ScalarType::Fixed32, Value::U32(x)) => out.extend(x.to_le_bytes()),
            (ScalarType::Sfixed32, Value::I32(x)) => out.extend(x.to_le_bytes()),
            (ScalarType::Float, Value::F32(x)) => out.extend(x.to_le_bytes()),
            (ScalarType::Fixed64, Value::U64(x)) => out.extend(x.to_le_bytes()),
            (ScalarType::Sfixed64, Value::I64(x)) => out.extend(x.to_le_bytes()),
            (ScalarType::Double, Value::F64(x)) => out.extend(x.to_le_bytes()),
            (ScalarType::String, Value::String(s)) => write_bytes(s.as_bytes(), out),
            (ScalarType::Bytes, Value::Bytes(b)) => write_bytes(b, out),
            _ => return Err(self.type_mismatch(field)),
        }
        Ok(())
    }
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    encode_varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

fn write_length_delimited(number: u32, bytes: &[u8], out: &mut Vec<u8>) {
    encode_tag(number, WireType::LengthDelimited, out);
    write_bytes(bytes, out);
}
