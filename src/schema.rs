//! Message schemas.
//!
//! A [`Schema`] describes a set of message types. Each message type has a
//! list of fields, and each field has a name, a number which identifies it in
//! encoded messages and a type which determines how its value is encoded.
//!
//! Schemas are built once from a [`SchemaDef`] and are immutable afterwards.
//! A definition can be constructed in code, loaded from a JSON document with
//! [`Schema::from_json`] or loaded from a compiled descriptor set with
//! [`Schema::from_descriptor_set`]. A schema can be shared by any number of
//! concurrent decode calls.
//!
//! # JSON schema format
//!
//! ```json
//! {
//!   "messages": [
//!     {
//!       "name": "User",
//!       "fields": [
//!         { "name": "id", "number": 1, "type": "int64" },
//!         { "name": "tags", "number": 2, "type": "string", "repeated": true },
//!         { "name": "profile", "number": 3, "type": "message", "message": "Profile" },
//!         { "name": "scores", "number": 4, "type": "map", "key": "string", "value": "int32" },
//!         { "name": "extra", "number": 5, "type": "any" }
//!       ]
//!     },
//!     { "name": "Profile", "fields": [{ "name": "bio", "number": 1, "type": "string" }] }
//!   ]
//! }
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;

use crate::descriptor::schema_from_descriptor_set;
use crate::errors::SchemaError;
use crate::record::{Record, Value};
use crate::wire::{WireType, MAX_FIELD_NUMBER};

/// Schema type of a field with a primitive value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    Enum,
    String,
    Bytes,
}

impl ScalarType {
    /// Return the wire type used for a single value of this type.
    pub fn wire_type(self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::Uint32
            | Self::Uint64
            | Self::Sint32
            | Self::Sint64
            | Self::Bool
            | Self::Enum => WireType::Varint,
            Self::Fixed32 | Self::Sfixed32 | Self::Float => WireType::Fixed32,
            Self::Fixed64 | Self::Sfixed64 | Self::Double => WireType::Fixed64,
            Self::String | Self::Bytes => WireType::LengthDelimited,
        }
    }

    /// Return true if repeated values of this type can use the packed
    /// encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }

    /// Return true if this type can be used for the keys of a map field.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(
            self,
            Self::Double | Self::Float | Self::Bytes | Self::Enum
        )
    }

    /// Return the value a field of this type has when it is absent.
    pub fn default_value(self) -> Value {
        match self {
            Self::Double => Value::F64(0.),
            Self::Float => Value::F32(0.),
            Self::Int32 | Self::Sint32 | Self::Sfixed32 => Value::I32(0),
            Self::Int64 | Self::Sint64 | Self::Sfixed64 => Value::I64(0),
            Self::Uint32 | Self::Fixed32 => Value::U32(0),
            Self::Uint64 | Self::Fixed64 => Value::U64(0),
            Self::Bool => Value::Bool(false),
            Self::Enum => Value::Enum(0),
            Self::String => Value::String(String::new()),
            Self::Bytes => Value::Bytes(Vec::new()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

/// Identifies a message type within a [`Schema`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(usize);

/// Resolved type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Scalar(ScalarType),

    /// An embedded message.
    Message(MessageId),

    /// A map. On the wire each entry is an embedded message with the key as
    /// field 1 and the value as field 2.
    ///
    /// The value type is either a scalar or a message.
    Map { key: ScalarType, value: Box<FieldType> },

    /// An embedded message of any type in the schema.
    ///
    /// On the wire this is a message with the type name as field 1 and the
    /// encoded message as field 2. Values whose type name is not in the
    /// schema are dropped when decoding.
    Any,
}

/// Field number of the type name in an `any` value.
pub(crate) const ANY_TYPE_FIELD: u32 = 1;

/// Field number of the encoded message in an `any` value.
pub(crate) const ANY_VALUE_FIELD: u32 = 2;

/// Return the message name from the type name of an `any` value.
///
/// Type names may be a bare message name or a URL whose last path segment is
/// the message name, eg. `type.googleapis.com/demo.User`.
pub(crate) fn any_message_name(type_name: &str) -> &str {
    type_name
        .rsplit_once('/')
        .map_or(type_name, |(_, name)| name)
}

/// Describes a single field of a message type.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    field_type: FieldType,
    repeated: bool,
    packed: bool,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Return true if this is a repeated field. Map fields are not repeated
    /// fields, although their entries are encoded like one.
    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    /// Return true if the encoder writes this repeated field as a packed run.
    ///
    /// The decoder accepts both packed and unpacked encodings of repeated
    /// numeric fields regardless of this flag.
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn is_map(&self) -> bool {
        matches!(self.field_type, FieldType::Map { .. })
    }

    /// Return the wire type of a single occurrence of this field in its
    /// unpacked form.
    pub fn wire_type(&self) -> WireType {
        match &self.field_type {
            FieldType::Scalar(ty) => ty.wire_type(),
            FieldType::Message(_) | FieldType::Map { .. } | FieldType::Any => {
                WireType::LengthDelimited
            }
        }
    }

    /// Return the value this field has when it is absent from a message.
    ///
    /// Returns `None` for singular message and `any` fields, which have no
    /// value when absent.
    pub fn default_value(&self) -> Option<Value> {
        if self.repeated {
            return Some(Value::List(Vec::new()));
        }
        match &self.field_type {
            FieldType::Scalar(ty) => Some(ty.default_value()),
            FieldType::Map { .. } => Some(Value::Map(Default::default())),
            FieldType::Message(_) | FieldType::Any => None,
        }
    }
}

/// Describes a message type.
#[derive(Debug)]
pub struct MessageDescriptor {
    name: String,
    id: MessageId,
    fields: Vec<FieldDescriptor>,
    by_number: FxHashMap<u32, usize>,
    by_name: FxHashMap<String, usize>,
}

impl MessageDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Return the fields of this message in the order they were defined.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Find a field by number. Returns the index of the field in
    /// [`fields`](Self::fields) and its descriptor.
    pub fn field_by_number(&self, number: u32) -> Option<(usize, &FieldDescriptor)> {
        self.by_number
            .get(&number)
            .map(|&index| (index, &self.fields[index]))
    }

    /// Find a field by name. Returns the index of the field in
    /// [`fields`](Self::fields) and its descriptor.
    pub fn field_by_name(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.by_name
            .get(name)
            .map(|&index| (index, &self.fields[index]))
    }
}

/// A set of message types.
#[derive(Debug)]
pub struct Schema {
    messages: Vec<Arc<MessageDescriptor>>,
    by_name: FxHashMap<String, MessageId>,
}

impl Schema {
    /// Build a schema from a definition, validating field numbers and
    /// resolving references between message types.
    pub fn build(def: SchemaDef) -> Result<Schema, SchemaError> {
        let mut by_name = FxHashMap::default();
        for (index, msg) in def.messages.iter().enumerate() {
            if by_name.insert(msg.name.clone(), MessageId(index)).is_some() {
                return Err(SchemaError::DuplicateMessage(msg.name.clone()));
            }
        }

        let mut messages = Vec::with_capacity(def.messages.len());
        for (index, msg) in def.messages.into_iter().enumerate() {
            let descriptor = build_message(msg, MessageId(index), &by_name)?;
            messages.push(Arc::new(descriptor));
        }

        debug!(messages = messages.len(), "built schema");

        Ok(Schema { messages, by_name })
    }

    /// Parse a JSON schema document and build a schema from it.
    ///
    /// See the [module documentation](self) for the format.
    pub fn from_json(json: &str) -> Result<Schema, SchemaError> {
        let def: SchemaDef = serde_json::from_str(json)?;
        Self::build(def)
    }

    /// Decode a `FileDescriptorSet`, as written by `protoc
    /// --descriptor_set_out`, and build a schema from the message types it
    /// defines.
    ///
    /// Message names are fully qualified with their package and enclosing
    /// messages, eg. `demo.User.Profile`. Fields of type
    /// `google.protobuf.Any` become [`FieldType::Any`] fields. Repeated
    /// numeric fields are packed by default in `proto3` files only.
    ///
    /// Groups are not supported.
    pub fn from_descriptor_set(buf: &[u8]) -> Result<Schema, SchemaError> {
        schema_from_descriptor_set(buf)
    }

    /// Find a message type by name.
    pub fn message(&self, name: &str) -> Option<&Arc<MessageDescriptor>> {
        self.by_name.get(name).map(|id| &self.messages[id.0])
    }

    /// Return the ID of the message type with a given name.
    pub fn message_id(&self, name: &str) -> Option<MessageId> {
        self.by_name.get(name).copied()
    }

    /// Return the message type with a given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this schema. Use
    /// [`get_message`](Self::get_message) for IDs of unknown origin.
    pub fn message_by_id(&self, id: MessageId) -> &Arc<MessageDescriptor> {
        &self.messages[id.0]
    }

    /// Return the message type with a given ID, or `None` if the ID is out
    /// of range for this schema.
    pub fn get_message(&self, id: MessageId) -> Option<&Arc<MessageDescriptor>> {
        self.messages.get(id.0)
    }

    /// Return all message types in the order they were defined.
    pub fn messages(&self) -> impl Iterator<Item = &Arc<MessageDescriptor>> {
        self.messages.iter()
    }

    /// Create an empty record for a message type.
    pub fn new_record(&self, name: &str) -> Option<Record> {
        self.message(name).map(|desc| Record::new(desc.clone()))
    }
}

fn build_message(
    def: MessageDef,
    id: MessageId,
    messages: &FxHashMap<String, MessageId>,
) -> Result<MessageDescriptor, SchemaError> {
    let mut fields = Vec::with_capacity(def.fields.len());
    let mut by_number = FxHashMap::default();
    let mut by_name = FxHashMap::default();

    for field in def.fields {
        if field.number == 0 || field.number > MAX_FIELD_NUMBER {
            return Err(SchemaError::InvalidFieldNumber {
                message: def.name,
                number: field.number,
            });
        }
        if by_number.insert(field.number, fields.len()).is_some() {
            return Err(SchemaError::DuplicateFieldNumber {
                message: def.name,
                number: field.number,
            });
        }
        if by_name.insert(field.name.clone(), fields.len()).is_some() {
            return Err(SchemaError::DuplicateFieldName {
                message: def.name,
                name: field.name,
            });
        }
        let descriptor = build_field(&def.name, field, messages)?;
        fields.push(descriptor);
    }

    Ok(MessageDescriptor {
        name: def.name,
        id,
        fields,
        by_number,
        by_name,
    })
}

fn build_field(
    message: &str,
    def: FieldDef,
    messages: &FxHashMap<String, MessageId>,
) -> Result<FieldDescriptor, SchemaError> {
    let invalid = |reason| SchemaError::InvalidField {
        message: message.to_string(),
        field: def.name.clone(),
        reason,
    };
    let resolve = |target: &Option<String>| match target {
        Some(target) => messages
            .get(target)
            .copied()
            .ok_or_else(|| SchemaError::UnknownMessage {
                message: message.to_string(),
                field: def.name.clone(),
                target: target.clone(),
            }),
        None => Err(invalid("missing message type")),
    };

    let field_type = match def.ty {
        TypeName::Message => FieldType::Message(resolve(&def.message)?),
        TypeName::Any => FieldType::Any,
        TypeName::Map => {
            if def.repeated {
                return Err(invalid("map fields cannot be repeated"));
            }
            let key = def
                .key
                .and_then(TypeName::as_scalar)
                .filter(|key| key.is_valid_map_key())
                .ok_or_else(|| SchemaError::InvalidMapKey {
                    message: message.to_string(),
                    field: def.name.clone(),
                })?;
            let value = match def.value {
                Some(TypeName::Message) => FieldType::Message(resolve(&def.value_message)?),
                Some(TypeName::Map) => return Err(invalid("map values cannot be maps")),
                Some(TypeName::Any) => return Err(invalid("map values cannot be any")),
                Some(ty) => FieldType::Scalar(ty.as_scalar().ok_or_else(|| invalid("bad value"))?),
                None => return Err(invalid("missing map value type")),
            };
            FieldType::Map {
                key,
                value: Box::new(value),
            }
        }
        ty => FieldType::Scalar(ty.as_scalar().ok_or_else(|| invalid("bad type"))?),
    };

    let packable = def.repeated && matches!(field_type, FieldType::Scalar(ty) if ty.is_packable());
    let packed = match def.packed {
        Some(true) if !packable => {
            return Err(invalid("only repeated numeric fields can be packed"));
        }
        Some(packed) => packed,
        None => packable,
    };

    Ok(FieldDescriptor {
        name: def.name,
        number: def.number,
        field_type,
        repeated: def.repeated,
        packed,
    })
}

/// Type names used in schema definitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeName {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    Enum,
    String,
    Bytes,
    Message,
    Map,
    Any,
}

impl TypeName {
    /// Return the scalar type with this name, or `None` for `message`, `map`
    /// and `any`.
    pub fn as_scalar(self) -> Option<ScalarType> {
        let ty = match self {
            Self::Double => ScalarType::Double,
            Self::Float => ScalarType::Float,
            Self::Int32 => ScalarType::Int32,
            Self::Int64 => ScalarType::Int64,
            Self::Uint32 => ScalarType::Uint32,
            Self::Uint64 => ScalarType::Uint64,
            Self::Sint32 => ScalarType::Sint32,
            Self::Sint64 => ScalarType::Sint64,
            Self::Fixed32 => ScalarType::Fixed32,
            Self::Fixed64 => ScalarType::Fixed64,
            Self::Sfixed32 => ScalarType::Sfixed32,
            Self::Sfixed64 => ScalarType::Sfixed64,
            Self::Bool => ScalarType::Bool,
            Self::Enum => ScalarType::Enum,
            Self::String => ScalarType::String,
            Self::Bytes => ScalarType::Bytes,
            Self::Message | Self::Map | Self::Any => return None,
        };
        Some(ty)
    }
}

impl From<ScalarType> for TypeName {
    fn from(val: ScalarType) -> Self {
        match val {
            ScalarType::Double => Self::Double,
            ScalarType::Float => Self::Float,
            ScalarType::Int32 => Self::Int32,
            ScalarType::Int64 => Self::Int64,
            ScalarType::Uint32 => Self::Uint32,
            ScalarType::Uint64 => Self::Uint64,
            ScalarType::Sint32 => Self::Sint32,
            ScalarType::Sint64 => Self::Sint64,
            ScalarType::Fixed32 => Self::Fixed32,
            ScalarType::Fixed64 => Self::Fixed64,
            ScalarType::Sfixed32 => Self::Sfixed32,
            ScalarType::Sfixed64 => Self::Sfixed64,
            ScalarType::Bool => Self::Bool,
            ScalarType::Enum => Self::Enum,
            ScalarType::String => Self::String,
            ScalarType::Bytes => Self::Bytes,
        }
    }
}

/// Unresolved definition of a schema.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SchemaDef {
    pub messages: Vec<MessageDef>,
}

impl SchemaDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message definition.
    pub fn message(mut self, message: MessageDef) -> Self {
        self.messages.push(message);
        self
    }
}

/// Unresolved definition of a message type.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field definition.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// Unresolved definition of a field.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    pub number: u32,
    #[serde(rename = "type")]
    pub ty: TypeName,
    #[serde(default)]
    pub repeated: bool,

    /// Whether a repeated numeric field is written in packed form. Defaults
    /// to true for repeated numeric fields.
    #[serde(default)]
    pub packed: Option<bool>,

    /// Name of the message type for `message` fields.
    #[serde(default)]
    pub message: Option<String>,

    /// Key type for `map` fields.
    #[serde(default)]
    pub key: Option<TypeName>,

    /// Value type for `map` fields.
    #[serde(default)]
    pub value: Option<TypeName>,

    /// Name of the message type for `map` fields with message values.
    #[serde(default)]
    pub value_message: Option<String>,
}

impl FieldDef {
    /// Define a field with a scalar type.
    pub fn new(name: impl Into<String>, number: u32, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            number,
            ty: ty.into(),
            repeated: false,
            packed: None,
            message: None,
            key: None,
            value: None,
            value_message: None,
        }
    }

    /// Define a field containing an embedded message.
    pub fn message(name: impl Into<String>, number: u32, message: impl Into<String>) -> Self {
        Self {
            ty: TypeName::Message,
            message: Some(message.into()),
            ..Self::new(name, number, ScalarType::Bytes)
        }
    }

    /// Define a map field with scalar values.
    pub fn map(name: impl Into<String>, number: u32, key: ScalarType, value: ScalarType) -> Self {
        Self {
            ty: TypeName::Map,
            key: Some(key.into()),
            value: Some(value.into()),
            ..Self::new(name, number, ScalarType::Bytes)
        }
    }

    /// Define a map field with message values.
    pub fn message_map(
        name: impl Into<String>,
        number: u32,
        key: ScalarType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ty: TypeName::Map,
            key: Some(key.into()),
            value: Some(TypeName::Message),
            value_message: Some(message.into()),
            ..Self::new(name, number, ScalarType::Bytes)
        }
    }

    /// Define a field containing an embedded message of any type.
    pub fn any(name: impl Into<String>, number: u32) -> Self {
        Self {
            ty: TypeName::Any,
            ..Self::new(name, number, ScalarType::Bytes)
        }
    }

    /// Mark this field as repeated.
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Set whether a repeated numeric field is written in packed form.
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = Some(packed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{
        any_message_name, FieldDef, FieldType, MessageDef, ScalarType, Schema, SchemaDef, TypeName,
    };
    use crate::errors::SchemaError;
    use crate::wire::WireType;

    fn user_schema() -> Schema {
        let def = SchemaDef::new()
            .message(
                MessageDef::new("User")
                    .field(FieldDef::new("id", 1, ScalarType::Int64))
                    .field(FieldDef::new("name", 2, ScalarType::String))
                    .field(FieldDef::new("scores", 3, ScalarType::Float).repeated())
                    .field(FieldDef::message("profile", 4, "Profile"))
                    .field(FieldDef::map("attrs", 5, ScalarType::String, ScalarType::Int32)),
            )
            .message(MessageDef::new("Profile").field(FieldDef::new("bio", 1, ScalarType::String)));
        Schema::build(def).unwrap()
    }

    #[test]
    fn test_build_schema() {
        let schema = user_schema();
        let user = schema.message("User").unwrap();
        assert_eq!(user.name(), "User");
        assert_eq!(user.fields().len(), 5);

        let (index, id) = user.field_by_number(1).unwrap();
        assert_eq!(index, 0);
        assert_eq!(id.name(), "id");
        assert_eq!(id.wire_type(), WireType::Varint);

        let (_, scores) = user.field_by_name("scores").unwrap();
        assert!(scores.is_repeated());
        assert!(scores.is_packed());
        assert_eq!(scores.wire_type(), WireType::Fixed32);

        let (_, profile) = user.field_by_name("profile").unwrap();
        let profile_id = schema.message_id("Profile").unwrap();
        assert_eq!(profile.field_type(), &FieldType::Message(profile_id));
        assert_eq!(profile.wire_type(), WireType::LengthDelimited);
        assert!(profile.default_value().is_none());

        let (_, attrs) = user.field_by_name("attrs").unwrap();
        assert!(attrs.is_map());
        assert!(!attrs.is_repeated());

        assert!(user.field_by_number(99).is_none());
        assert!(schema.message("Missing").is_none());
    }

    #[test]
    fn test_schema_from_json() {
        let schema = Schema::from_json(
            r#"{
              "messages": [
                {
                  "name": "User",
                  "fields": [
                    { "name": "id", "number": 1, "type": "int64" },
                    { "name": "tags", "number": 2, "type": "string", "repeated": true },
                    { "name": "ids", "number": 3, "type": "sint32", "repeated": true, "packed": false },
                    { "name": "friends", "number": 4, "type": "map", "key": "uint64", "value": "message", "value_message": "User" }
                  ]
                }
              ]
            }"#,
        )
        .unwrap();

        let user = schema.message("User").unwrap();
        let (_, tags) = user.field_by_name("tags").unwrap();
        assert!(tags.is_repeated());
        assert!(!tags.is_packed());

        let (_, ids) = user.field_by_name("ids").unwrap();
        assert_eq!(ids.field_type(), &FieldType::Scalar(ScalarType::Sint32));
        assert!(!ids.is_packed());

        let (_, friends) = user.field_by_name("friends").unwrap();
        assert_eq!(
            friends.field_type(),
            &FieldType::Map {
                key: ScalarType::Uint64,
                value: Box::new(FieldType::Message(user.id())),
            }
        );
    }

    #[test]
    fn test_invalid_schemas() {
        let build = |msg: MessageDef| Schema::build(SchemaDef::new().message(msg));

        let err = build(
            MessageDef::new("M")
                .field(FieldDef::new("a", 1, ScalarType::Int32))
                .field(FieldDef::new("b", 1, ScalarType::Int32)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SchemaError::DuplicateFieldNumber { number: 1, .. }));

        let err = build(
            MessageDef::new("M")
                .field(FieldDef::new("a", 1, ScalarType::Int32))
                .field(FieldDef::new("a", 2, ScalarType::Int32)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SchemaError::DuplicateFieldName { .. }));

        let err = build(MessageDef::new("M").field(FieldDef::new("a", 0, ScalarType::Int32)))
            .err()
            .unwrap();
        assert!(matches!(err, SchemaError::InvalidFieldNumber { number: 0, .. }));

        let err = build(MessageDef::new("M").field(FieldDef::message("a", 1, "Nope")))
            .err()
            .unwrap();
        assert!(matches!(err, SchemaError::UnknownMessage { .. }));

        let err = build(MessageDef::new("M").field(FieldDef::map(
            "a",
            1,
            ScalarType::Float,
            ScalarType::Int32,
        )))
        .err()
        .unwrap();
        assert!(matches!(err, SchemaError::InvalidMapKey { .. }));

        let err = build(
            MessageDef::new("M").field(FieldDef::new("a", 1, ScalarType::String).repeated().packed(true)),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SchemaError::InvalidField { .. }));

        let err = Schema::build(
            SchemaDef::new()
                .message(MessageDef::new("M"))
                .message(MessageDef::new("M")),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SchemaError::DuplicateMessage(_)));

        let err = Schema::from_json(r#"{"messages": [{"name": "M", "fields": [{"name": "a"}]}]}"#)
            .err()
            .unwrap();
        assert!(matches!(err, SchemaError::Json(_)));
    }

    #[test]
    fn test_any_field() {
        let schema = Schema::from_json(
            r#"{"messages": [{"name": "M", "fields": [{"name": "extra", "number": 1, "type": "any", "repeated": true}]}]}"#,
        )
        .unwrap();
        let (_, extra) = schema.message("M").unwrap().field_by_name("extra").unwrap();
        assert_eq!(extra.field_type(), &FieldType::Any);
        assert_eq!(extra.wire_type(), WireType::LengthDelimited);
        assert!(extra.is_repeated());
        assert!(!extra.is_packed());

        let any_values = FieldDef {
            value: Some(TypeName::Any),
            ..FieldDef::map("m", 1, ScalarType::String, ScalarType::Int32)
        };
        let err = Schema::build(SchemaDef::new().message(MessageDef::new("M").field(any_values)))
            .err()
            .unwrap();
        assert!(matches!(err, SchemaError::InvalidField { .. }));

        assert_eq!(any_message_name("type.googleapis.com/demo.User"), "demo.User");
        assert_eq!(any_message_name("demo.User"), "demo.User");
    }

    #[test]
    fn test_schema_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
    }
}
