//! Loading schemas from compiled descriptor sets.
//!
//! `protoc --descriptor_set_out` writes a `FileDescriptorSet`, which is
//! itself a message in the wire format. It is decoded with a built-in schema
//! that covers the parts of the descriptor messages needed to build a
//! [`Schema`]. Everything else (enums, services, extensions, most options)
//! is skipped as unknown fields.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::decode::decode;
use crate::errors::SchemaError;
use crate::record::{Record, Value};
use crate::schema::{FieldDef, MessageDef, ScalarType, Schema, SchemaDef, TypeName};

/// Fully qualified name of the well-known `Any` message.
const ANY_TYPE_NAME: &str = "google.protobuf.Any";

// Values of `FieldDescriptorProto.Label`.
const LABEL_REPEATED: i64 = 3;

// Values of `FieldDescriptorProto.Type`.
const TYPE_DOUBLE: i64 = 1;
const TYPE_FLOAT: i64 = 2;
const TYPE_INT64: i64 = 3;
const TYPE_UINT64: i64 = 4;
const TYPE_INT32: i64 = 5;
const TYPE_FIXED64: i64 = 6;
const TYPE_FIXED32: i64 = 7;
const TYPE_BOOL: i64 = 8;
const TYPE_STRING: i64 = 9;
const TYPE_GROUP: i64 = 10;
const TYPE_MESSAGE: i64 = 11;
const TYPE_BYTES: i64 = 12;
const TYPE_UINT32: i64 = 13;
const TYPE_ENUM: i64 = 14;
const TYPE_SFIXED32: i64 = 15;
const TYPE_SFIXED64: i64 = 16;
const TYPE_SINT32: i64 = 17;
const TYPE_SINT64: i64 = 18;

/// Build the schema of the descriptor messages.
fn descriptor_schema() -> Result<Schema, SchemaError> {
    Schema::build(
        SchemaDef::new()
            .message(
                MessageDef::new("FileDescriptorSet")
                    .field(FieldDef::message("file", 1, "FileDescriptorProto").repeated()),
            )
            .message(
                MessageDef::new("FileDescriptorProto")
                    .field(FieldDef::new("name", 1, ScalarType::String))
                    .field(FieldDef::new("package", 2, ScalarType::String))
                    .field(FieldDef::message("message_type", 4, "DescriptorProto").repeated())
                    .field(FieldDef::new("syntax", 12, ScalarType::String)),
            )
            .message(
                MessageDef::new("DescriptorProto")
                    .field(FieldDef::new("name", 1, ScalarType::String))
                    .field(FieldDef::message("field", 2, "FieldDescriptorProto").repeated())
                    .field(FieldDef::message("nested_type", 3, "DescriptorProto").repeated())
                    .field(FieldDef::message("options", 7, "MessageOptions")),
            )
            .message(
                MessageDef::new("MessageOptions")
                    .field(FieldDef::new("map_entry", 7, ScalarType::Bool)),
            )
            .message(
                MessageDef::new("FieldDescriptorProto")
                    .field(FieldDef::new("name", 1, ScalarType::String))
                    .field(FieldDef::new("number", 3, ScalarType::Int32))
                    .field(FieldDef::new("label", 4, ScalarType::Enum))
                    .field(FieldDef::new("type", 5, ScalarType::Enum))
                    .field(FieldDef::new("type_name", 6, ScalarType::String))
                    .field(FieldDef::message("options", 8, "FieldOptions")),
            )
            .message(
                MessageDef::new("FieldOptions").field(FieldDef::new("packed", 2, ScalarType::Bool)),
            ),
    )
}

/// A message type found in a descriptor set.
struct MessageEntry<'a> {
    /// Fully qualified name, without a leading dot.
    name: String,
    desc: &'a Record,
    proto3: bool,
    map_entry: bool,
}

pub(crate) fn schema_from_descriptor_set(buf: &[u8]) -> Result<Schema, SchemaError> {
    let set = decode(&descriptor_schema()?, "FileDescriptorSet", buf)?;

    let mut messages = Vec::new();
    for file in records(&set, "file") {
        let package = string_field(file, "package");
        let proto3 = string_field(file, "syntax") == "proto3";
        for desc in records(file, "message_type") {
            collect_messages(desc, package, proto3, &mut messages);
        }
    }

    // Map fields refer to a synthesized entry message. These become map
    // fields rather than message types of their own.
    let map_entries: FxHashMap<&str, &Record> = messages
        .iter()
        .filter(|msg| msg.map_entry)
        .map(|msg| (msg.name.as_str(), msg.desc))
        .collect();

    let mut def = SchemaDef::new();
    for msg in messages.iter().filter(|msg| !msg.map_entry) {
        let mut message_def = MessageDef::new(msg.name.clone());
        for field in records(msg.desc, "field") {
            let field = field_def(&msg.name, field, msg.proto3, &map_entries)?;
            message_def = message_def.field(field);
        }
        def = def.message(message_def);
    }

    debug!(
        messages = def.messages.len(),
        map_entries = map_entries.len(),
        "loaded descriptor set"
    );

    Schema::build(def)
}

fn collect_messages<'a>(
    desc: &'a Record,
    scope: &str,
    proto3: bool,
    out: &mut Vec<MessageEntry<'a>>,
) {
    let name = qualify(scope, string_field(desc, "name"));
    let map_entry = desc
        .get("options")
        .and_then(Value::as_message)
        .and_then(|opts| opts.get("map_entry"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    for nested in records(desc, "nested_type") {
        collect_messages(nested, &name, proto3, out);
    }
    out.push(MessageEntry {
        name,
        desc,
        proto3,
        map_entry,
    });
}

fn field_def(
    message: &str,
    field: &Record,
    proto3: bool,
    map_entries: &FxHashMap<&str, &Record>,
) -> Result<FieldDef, SchemaError> {
    let name = string_field(field, "name");
    let invalid = |reason| SchemaError::InvalidField {
        message: message.to_string(),
        field: name.to_string(),
        reason,
    };

    // Out of range numbers are rejected when the schema is built.
    let number = u32::try_from(int_field(field, "number")).unwrap_or(0);
    let type_name = type_name(field);

    let def = match int_field(field, "type") {
        TYPE_MESSAGE if type_name == ANY_TYPE_NAME => FieldDef::any(name, number),
        TYPE_MESSAGE => match map_entries.get(type_name) {
            Some(entry) => map_def(name, number, entry).ok_or_else(|| invalid("invalid map entry"))?,
            None => FieldDef::message(name, number, type_name),
        },
        TYPE_GROUP => return Err(invalid("groups are not supported")),
        ty => FieldDef::new(
            name,
            number,
            scalar_type(ty).ok_or_else(|| invalid("unknown field type"))?,
        ),
    };

    // Entries of a map field are encoded as a repeated field, but the map
    // itself is not a repeated field.
    let def = if int_field(field, "label") == LABEL_REPEATED && def.ty != TypeName::Map {
        def.repeated()
    } else {
        def
    };

    // Repeated numeric fields are packed by default in proto3 only.
    let packed = field
        .get("options")
        .and_then(Value::as_message)
        .and_then(|opts| opts.get("packed"))
        .and_then(Value::as_bool);
    let def = match packed {
        Some(packed) => def.packed(packed),
        None if !proto3 => def.packed(false),
        None => def,
    };

    Ok(def)
}

/// Build a map field from the key (field 1) and value (field 2) of its
/// entry message.
fn map_def(name: &str, number: u32, entry: &Record) -> Option<FieldDef> {
    let entry_field = |number| records(entry, "field").find(|f| int_field(f, "number") == number);
    let key = scalar_type(int_field(entry_field(1)?, "type"))?;
    let value = entry_field(2)?;

    let def = match int_field(value, "type") {
        TYPE_MESSAGE => FieldDef::message_map(name, number, key, type_name(value)),
        ty => FieldDef::map(name, number, key, scalar_type(ty)?),
    };
    Some(def)
}

fn scalar_type(ty: i64) -> Option<ScalarType> {
    let ty = match ty {
        TYPE_DOUBLE => ScalarType::Double,
        TYPE_FLOAT => ScalarType::Float,
        TYPE_INT64 => ScalarType::Int64,
        TYPE_UINT64 => ScalarType::Uint64,
        TYPE_INT32 => ScalarType::Int32,
        TYPE_FIXED64 => ScalarType::Fixed64,
        TYPE_FIXED32 => ScalarType::Fixed32,
        TYPE_BOOL => ScalarType::Bool,
        TYPE_STRING => ScalarType::String,
        TYPE_BYTES => ScalarType::Bytes,
        TYPE_UINT32 => ScalarType::Uint32,
        TYPE_ENUM => ScalarType::Enum,
        TYPE_SFIXED32 => ScalarType::Sfixed32,
        TYPE_SFIXED64 => ScalarType::Sfixed64,
        TYPE_SINT32 => ScalarType::Sint32,
        TYPE_SINT64 => ScalarType::Sint64,
        _ => return None,
    };
    Some(ty)
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// Return the message type a field refers to, without the leading dot which
/// marks fully qualified names.
fn type_name(field: &Record) -> &str {
    let name = string_field(field, "type_name");
    name.strip_prefix('.').unwrap_or(name)
}

fn records<'a>(record: &'a Record, name: &str) -> impl Iterator<Item = &'a Record> {
    record
        .get(name)
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_message)
}

fn string_field<'a>(record: &'a Record, name: &str) -> &'a str {
    record.get(name).and_then(Value::as_str).unwrap_or("")
}

fn int_field(record: &Record, name: &str) -> i64 {
    record.get(name).and_then(Value::as_i64).unwrap_or(0)
}
