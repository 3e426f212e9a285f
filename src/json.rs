//! Conversion between records and JSON.
//!
//! Records are rendered as JSON objects keyed by field name. Repeated fields
//! become arrays and map fields become objects, with map keys converted to
//! strings. Bytes are rendered as arrays of numbers. Floats which are not
//! finite have no JSON representation and are rendered as `null`.
//!
//! Messages in `any` fields are rendered like other messages, with an extra
//! `@type` key holding the message type name.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde_json::{Map, Number};

use crate::record::{MapKey, Record, Value};
use crate::schema::{
    any_message_name, FieldDescriptor, FieldType, MessageDescriptor, ScalarType, Schema,
};

/// Key which holds the message type of an `any` value.
const ANY_TYPE_KEY: &str = "@type";

/// Options for [`to_json`].
#[derive(Clone, Debug, Default)]
pub struct JsonOptions {
    /// Include fields which are absent from the record, with their default
    /// values. Absent embedded messages are rendered as `null`.
    pub emit_defaults: bool,
}

/// Render a record as a JSON object.
pub fn to_json(record: &Record, opts: &JsonOptions) -> serde_json::Value {
    let mut object = Map::new();
    for field in record.descriptor().fields() {
        let value = match record.get(field.name()) {
            Some(value) => field_to_json(field, value, opts),
            None if opts.emit_defaults => field
                .default_value()
                .map(|value| value_to_json(&value, opts))
                .unwrap_or(serde_json::Value::Null),
            None => continue,
        };
        object.insert(field.name().to_string(), value);
    }
    serde_json::Value::Object(object)
}

fn field_to_json(field: &FieldDescriptor, value: &Value, opts: &JsonOptions) -> serde_json::Value {
    match (field.field_type(), value) {
        (FieldType::Any, Value::List(items)) => {
            serde_json::Value::Array(items.iter().map(|item| any_to_json(item, opts)).collect())
        }
        (FieldType::Any, value) => any_to_json(value, opts),
        _ => value_to_json(value, opts),
    }
}

fn any_to_json(value: &Value, opts: &JsonOptions) -> serde_json::Value {
    let mut json = value_to_json(value, opts);
    if let (Value::Message(record), Some(object)) = (value, json.as_object_mut()) {
        object.insert(
            ANY_TYPE_KEY.to_string(),
            serde_json::Value::String(record.message_name().to_string()),
        );
    }
    json
}

fn value_to_json(value: &Value, opts: &JsonOptions) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Bool(x) => Json::Bool(*x),
        Value::I32(x) | Value::Enum(x) => Json::from(*x),
        Value::I64(x) => Json::from(*x),
        Value::U32(x) => Json::from(*x),
        Value::U64(x) => Json::from(*x),
        Value::F32(x) => float_to_json(*x as f64),
        Value::F64(x) => float_to_json(*x),
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::Array(b.iter().map(|&byte| Json::from(byte)).collect()),
        Value::Message(record) => to_json(record, opts),
        Value::List(items) => Json::Array(items.iter().map(|item| value_to_json(item, opts)).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value_to_json(value, opts)))
                .collect(),
        ),
    }
}

fn float_to_json(x: f64) -> serde_json::Value {
    Number::from_f64(x)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Errors converting JSON into a [`Record`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum JsonError {
    /// The requested message type does not exist in the schema.
    UnknownMessage(String),

    /// A JSON object has a key which is not a field of its message type.
    UnknownField { message: String, field: String },

    /// A message was represented by a JSON value which is not an object.
    NotAnObject { message: String },

    /// A JSON value cannot be converted to the type of its field.
    InvalidValue {
        message: String,
        field: String,
        expected: &'static str,
    },
}

impl Display for JsonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMessage(name) => write!(f, "unknown message type \"{}\"", name),
            Self::UnknownField { message, field } => {
                write!(f, "message \"{}\" has no field \"{}\"", message, field)
            }
            Self::NotAnObject { message } => {
                write!(f, "expected an object for message \"{}\"", message)
            }
            Self::InvalidValue {
                message,
                field,
                expected,
            } => write!(
                f,
                "invalid value for \"{}.{}\": expected {}",
                message, field, expected
            ),
        }
    }
}

impl Error for JsonError {}

/// Build a record of the type named `message` from a JSON object.
///
/// This accepts the output of [`to_json`]. Keys whose value is `null` are
/// treated as absent.
pub fn from_json(
    schema: &Schema,
    message: &str,
    json: &serde_json::Value,
) -> Result<Record, JsonError> {
    let descriptor = schema
        .message(message)
        .ok_or_else(|| JsonError::UnknownMessage(message.to_string()))?;
    JsonReader { schema }.read_message(descriptor, json)
}

struct JsonReader<'a> {
    schema: &'a Schema,
}

impl JsonReader<'_> {
    fn read_message(
        &self,
        descriptor: &Arc<MessageDescriptor>,
        json: &serde_json::Value,
    ) -> Result<Record, JsonError> {
        let object = json.as_object().ok_or_else(|| JsonError::NotAnObject {
            message: descriptor.name().to_string(),
        })?;
        self.read_fields(descriptor, object.iter())
    }

    fn read_fields<'j>(
        &self,
        descriptor: &Arc<MessageDescriptor>,
        fields: impl Iterator<Item = (&'j String, &'j serde_json::Value)>,
    ) -> Result<Record, JsonError> {
        let mut record = Record::new(descriptor.clone());
        for (key, json_value) in fields {
            let Some((index, field)) = descriptor.field_by_name(key) else {
                return Err(JsonError::UnknownField {
                    message: descriptor.name().to_string(),
                    field: key.clone(),
                });
            };
            if json_value.is_null() {
                continue;
            }

            let ctx = FieldContext {
                message: descriptor,
                field,
            };
            let value = if field.is_repeated() {
                let items = json_value.as_array().ok_or_else(|| ctx.invalid("an array"))?;
                let items = items
                    .iter()
                    .map(|item| self.read_value(&ctx, field.field_type(), item))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::List(items)
            } else {
                self.read_value(&ctx, field.field_type(), json_value)?
            };
            record.set_at(index, value);
        }
        Ok(record)
    }

    fn read_value(
        &self,
        ctx: &FieldContext,
        field_type: &FieldType,
        json: &serde_json::Value,
    ) -> Result<Value, JsonError> {
        match field_type {
            FieldType::Scalar(ty) => read_scalar(ctx, *ty, json),
            FieldType::Message(id) => {
                let record = self.read_message(self.schema.message_by_id(*id), json)?;
                Ok(Value::Message(record))
            }
            FieldType::Map { key, value } => {
                let object = json.as_object().ok_or_else(|| ctx.invalid("an object"))?;
                let mut entries = std::collections::BTreeMap::new();
                for (key_str, json_value) in object {
                    let key = read_map_key(ctx, *key, key_str)?;
                    let value = self.read_value(ctx, value, json_value)?;
                    entries.insert(key, value);
                }
                Ok(Value::Map(entries))
            }
            FieldType::Any => {
                let object = json.as_object().ok_or_else(|| ctx.invalid("an object"))?;
                let type_name = object
                    .get(ANY_TYPE_KEY)
                    .and_then(|name| name.as_str())
                    .ok_or_else(|| ctx.invalid("an object with an \"@type\" key"))?;
                let descriptor = self
                    .schema
                    .message(any_message_name(type_name))
                    .ok_or_else(|| JsonError::UnknownMessage(type_name.to_string()))?;
                let fields = object.iter().filter(|(key, _)| key.as_str() != ANY_TYPE_KEY);
                Ok(Value::Message(self.read_fields(descriptor, fields)?))
            }
        }
    }
}

/// Field being converted, for error reporting.
struct FieldContext<'a> {
    message: &'a MessageDescriptor,
    field: &'a FieldDescriptor,
}

impl FieldContext<'_> {
    fn invalid(&self, expected: &'static str) -> JsonError {
        JsonError::InvalidValue {
            message: self.message.name().to_string(),
            field: self.field.name().to_string(),
            expected,
        }
    }
}

fn read_scalar(ctx: &FieldContext, ty: ScalarType, json: &serde_json::Value) -> Result<Value, JsonError> {
    let int = || json.as_i64().ok_or_else(|| ctx.invalid("an integer"));
    let uint = || json.as_u64().ok_or_else(|| ctx.invalid("an unsigned integer"));
    let float = || json.as_f64().ok_or_else(|| ctx.invalid("a number"));

    let value = match ty {
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
            Value::I32(i32::try_from(int()?).map_err(|_| ctx.invalid("a 32-bit integer"))?)
        }
        ScalarType::Enum => {
            Value::Enum(i32::try_from(int()?).map_err(|_| ctx.invalid("a 32-bit integer"))?)
        }
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::I64(int()?),
        ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(
            u32::try_from(uint()?).map_err(|_| ctx.invalid("a 32-bit unsigned integer"))?,
        ),
        ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(uint()?),
        ScalarType::Float => Value::F32(float()? as f32),
        ScalarType::Double => Value::F64(float()?),
        ScalarType::Bool => Value::Bool(json.as_bool().ok_or_else(|| ctx.invalid("a boolean"))?),
        ScalarType::String => Value::String(
            json.as_str()
                .ok_or_else(|| ctx.invalid("a string"))?
                .to_string(),
        ),
        ScalarType::Bytes => {
            let items = json.as_array().ok_or_else(|| ctx.invalid("an array of bytes"))?;
            let bytes = items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|x| u8::try_from(x).ok())
                        .ok_or_else(|| ctx.invalid("an array of bytes"))
                })
                .collect::<Result<Vec<u8>, _>>()?;
            Value::Bytes(bytes)
        }
    };
    Ok(value)
}

fn read_map_key(ctx: &FieldContext, ty: ScalarType, key: &str) -> Result<MapKey, JsonError> {
    let invalid = || ctx.invalid("a valid map key");
    let key = match ty {
        ScalarType::Bool => MapKey::Bool(key.parse().map_err(|_| invalid())?),
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
            MapKey::I32(key.parse().map_err(|_| invalid())?)
        }
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => {
            MapKey::I64(key.parse().map_err(|_| invalid())?)
        }
        ScalarType::Uint32 | ScalarType::Fixed32 => MapKey::U32(key.parse().map_err(|_| invalid())?),
        ScalarType::Uint64 | ScalarType::Fixed64 => MapKey::U64(key.parse().map_err(|_| invalid())?),
        ScalarType::String => MapKey::String(key.to_string()),
        ScalarType::Double | ScalarType::Float | ScalarType::Bytes | ScalarType::Enum => {
            return Err(invalid());
        }
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{from_json, to_json, JsonError, JsonOptions};
    use crate::record::Value;
    use crate::schema::Schema;

    fn test_schema() -> Schema {
        Schema::from_json(
            r#"{
              "messages": [
                {
                  "name": "User",
                  "fields": [
                    { "name": "id", "number": 1, "type": "int64" },
                    { "name": "name", "number": 2, "type": "string" },
                    { "name": "tags", "number": 3, "type": "string", "repeated": true },
                    { "name": "profile", "number": 4, "type": "message", "message": "Profile" },
                    { "name": "scores", "number": 5, "type": "map", "key": "uint32", "value": "double" },
                    { "name": "avatar", "number": 6, "type": "bytes" },
                    { "name": "kind", "number": 7, "type": "enum" }
                  ]
                },
                {
                  "name": "Profile",
                  "fields": [{ "name": "age", "number": 1, "type": "uint32" }]
                }
              ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_to_json() {
        let schema = test_schema();
        let profile = schema.new_record("Profile").unwrap().with("age", 30u32).unwrap();
        let user = schema
            .new_record("User")
            .unwrap()
            .with("id", 7i64)
            .unwrap()
            .with("tags", Value::List(vec!["a".into(), "b".into()]))
            .unwrap()
            .with("profile", profile)
            .unwrap()
            .with("avatar", vec![1u8, 2])
            .unwrap();

        assert_eq!(
            to_json(&user, &JsonOptions::default()),
            json!({
                "id": 7,
                "tags": ["a", "b"],
                "profile": { "age": 30 },
                "scores": {},
                "avatar": [1, 2],
            })
        );
    }

    #[test]
    fn test_to_json_emit_defaults() {
        let schema = test_schema();
        let user = schema.new_record("User").unwrap();
        let opts = JsonOptions {
            emit_defaults: true,
        };
        assert_eq!(
            to_json(&user, &opts),
            json!({
                "id": 0,
                "name": "",
                "tags": [],
                "profile": null,
                "scores": {},
                "avatar": [],
                "kind": 0,
            })
        );
    }

    #[test]
    fn test_non_finite_float() {
        let schema = test_schema();
        let mut scores = std::collections::BTreeMap::new();
        scores.insert(crate::record::MapKey::U32(1), Value::F64(f64::NAN));
        scores.insert(crate::record::MapKey::U32(2), Value::F64(0.5));
        let user = schema
            .new_record("User")
            .unwrap()
            .with("scores", Value::Map(scores))
            .unwrap();
        assert_eq!(
            to_json(&user, &JsonOptions::default())["scores"],
            json!({ "1": null, "2": 0.5 })
        );
    }

    #[test]
    fn test_from_json_round_trip() {
        let schema = test_schema();
        let json = json!({
            "id": -3,
            "name": "ann",
            "tags": ["x"],
            "profile": { "age": 4 },
            "scores": { "10": 1.5 },
            "avatar": [255, 0],
            "kind": 2,
        });
        let user = from_json(&schema, "User", &json).unwrap();
        assert_eq!(user.get("id"), Some(&Value::I64(-3)));
        assert_eq!(user.get("kind"), Some(&Value::Enum(2)));
        assert_eq!(to_json(&user, &JsonOptions::default()), json);
    }

    #[test]
    fn test_any_json() {
        let schema = Schema::from_json(
            r#"{
              "messages": [
                {
                  "name": "Envelope",
                  "fields": [
                    { "name": "body", "number": 1, "type": "any" },
                    { "name": "parts", "number": 2, "type": "any", "repeated": true }
                  ]
                },
                { "name": "Note", "fields": [{ "name": "text", "number": 1, "type": "string" }] }
              ]
            }"#,
        )
        .unwrap();

        let json = json!({
            "body": { "@type": "Note", "text": "hi" },
            "parts": [{ "@type": "Envelope", "parts": [] }],
        });
        let envelope = from_json(&schema, "Envelope", &json).unwrap();
        let body = envelope.get("body").and_then(|v| v.as_message()).unwrap();
        assert_eq!(body.message_name(), "Note");
        assert_eq!(to_json(&envelope, &JsonOptions::default()), json);

        assert_eq!(
            from_json(&schema, "Envelope", &json!({ "body": { "@type": "Ghost" } })).err(),
            Some(JsonError::UnknownMessage("Ghost".into()))
        );
        assert!(matches!(
            from_json(&schema, "Envelope", &json!({ "body": { "text": "hi" } })),
            Err(JsonError::InvalidValue { ref field, .. }) if field == "body"
        ));
    }

    #[test]
    fn test_from_json_null_is_absent() {
        let schema = test_schema();
        let user = from_json(&schema, "User", &json!({ "profile": null })).unwrap();
        assert_eq!(user.get("profile"), None);
    }

    #[test]
    fn test_from_json_errors() {
        let schema = test_schema();

        assert_eq!(
            from_json(&schema, "Nope", &json!({})).err(),
            Some(JsonError::UnknownMessage("Nope".into()))
        );
        assert_eq!(
            from_json(&schema, "User", &json!([])).err(),
            Some(JsonError::NotAnObject {
                message: "User".into()
            })
        );
        assert_eq!(
            from_json(&schema, "User", &json!({ "nope": 1 })).err(),
            Some(JsonError::UnknownField {
                message: "User".into(),
                field: "nope".into()
            })
        );
        assert!(matches!(
            from_json(&schema, "User", &json!({ "profile": { "age": -1 } })),
            Err(JsonError::InvalidValue { ref field, .. }) if field == "age"
        ));
        assert!(matches!(
            from_json(&schema, "User", &json!({ "scores": { "x": 1.0 } })),
            Err(JsonError::InvalidValue { .. })
        ));
        assert!(matches!(
            from_json(&schema, "User", &json!({ "avatar": [256] })),
            Err(JsonError::InvalidValue { .. })
        ));
        assert!(matches!(
            from_json(&schema, "User", &json!({ "tags": "x" })),
            Err(JsonError::InvalidValue { .. })
        ));
    }
}
