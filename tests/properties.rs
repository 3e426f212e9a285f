//! Randomized tests of decoder properties which should hold for any input.

use std::collections::BTreeMap;

use tagwire::{
    decode, decode_varint, encode, encode_varint, varint_len, Decoder, ErrorKind, FieldDef,
    FieldDescriptor, FieldType, MapKey, MessageDef, Record, ScalarType, Schema, SchemaDef, Value,
};
use tagwire_testing::WireBuilder;

const ITERATIONS: usize = 200;

fn test_schema() -> Schema {
    let scalars = [
        ScalarType::Double,
        ScalarType::Float,
        ScalarType::Int32,
        ScalarType::Int64,
        ScalarType::Uint32,
        ScalarType::Uint64,
        ScalarType::Sint32,
        ScalarType::Sint64,
        ScalarType::Fixed32,
        ScalarType::Fixed64,
        ScalarType::Sfixed32,
        ScalarType::Sfixed64,
        ScalarType::Bool,
        ScalarType::Enum,
        ScalarType::String,
        ScalarType::Bytes,
    ];

    let mut item = MessageDef::new("Item");
    let mut number = 1;
    for ty in scalars {
        item = item
            .field(FieldDef::new(ty.name(), number, ty))
            .field(FieldDef::new(format!("{}_list", ty.name()), number + 1, ty).repeated());
        number += 2;
    }
    item = item
        .field(FieldDef::new("unpacked", 100, ScalarType::Int64).repeated().packed(false))
        .field(FieldDef::message("child", 101, "Item"))
        .field(FieldDef::message("children", 102, "Item").repeated())
        .field(FieldDef::map("by_name", 103, ScalarType::String, ScalarType::Sint32))
        .field(FieldDef::message_map("by_id", 104, ScalarType::Uint64, "Item"))
        .field(FieldDef::any("extra", 105));

    Schema::build(SchemaDef::new().message(item)).unwrap()
}

fn random_scalar(rng: &mut fastrand::Rng, ty: ScalarType) -> Value {
    match ty {
        ScalarType::Double => Value::F64(rng.f64() * 1e6 - 5e5),
        ScalarType::Float => Value::F32(rng.f32() * 100. - 50.),
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Value::I32(rng.i32(..)),
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::I64(rng.i64(..)),
        ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(rng.u32(..)),
        ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(rng.u64(..)),
        ScalarType::Bool => Value::Bool(rng.bool()),
        ScalarType::Enum => Value::Enum(rng.i32(-5..20)),
        ScalarType::String => {
            let len = rng.usize(0..12);
            Value::String((0..len).map(|_| rng.char(..)).collect())
        }
        ScalarType::Bytes => {
            let len = rng.usize(0..12);
            Value::Bytes((0..len).map(|_| rng.u8(..)).collect())
        }
    }
}

fn random_value(
    rng: &mut fastrand::Rng,
    schema: &Schema,
    field: &FieldDescriptor,
    depth: usize,
) -> Option<Value> {
    let single = |rng: &mut fastrand::Rng, field_type: &FieldType| match field_type {
        FieldType::Scalar(ty) => Some(random_scalar(rng, *ty)),
        FieldType::Message(_) | FieldType::Any if depth >= 2 => None,
        FieldType::Message(id) => Some(Value::Message(random_record(
            rng,
            schema,
            schema.message_by_id(*id).name(),
            depth + 1,
        ))),
        FieldType::Any => Some(Value::Message(random_record(rng, schema, "Item", depth + 1))),
        FieldType::Map { .. } => None,
    };

    match field.field_type() {
        FieldType::Map { key, value } => {
            let mut entries = BTreeMap::new();
            for _ in 0..rng.usize(0..4) {
                let key = MapKey::from_value(random_scalar(rng, *key))?;
                entries.insert(key, single(rng, &**value)?);
            }
            Some(Value::Map(entries))
        }
        field_type if field.is_repeated() => {
            let len = rng.usize(0..5);
            let items = (0..len)
                .map(|_| single(rng, field_type))
                .collect::<Option<Vec<_>>>()
                .unwrap_or_default();
            Some(Value::List(items))
        }
        field_type => single(rng, field_type),
    }
}

fn random_record(rng: &mut fastrand::Rng, schema: &Schema, name: &str, depth: usize) -> Record {
    let mut record = schema.new_record(name).unwrap();
    let descriptor = record.descriptor().clone();
    for field in descriptor.fields() {
        if !rng.bool() {
            continue;
        }
        if let Some(value) = random_value(rng, schema, field, depth) {
            record.set(field.name(), value).unwrap();
        }
    }
    record
}

#[test]
fn test_encode_decode_round_trip() {
    let schema = test_schema();
    let mut rng = fastrand::Rng::with_seed(1234);

    for _ in 0..ITERATIONS {
        let record = random_record(&mut rng, &schema, "Item", 0);
        let buf = encode(&schema, &record).unwrap();
        let decoded = decode(&schema, "Item", &buf).unwrap();
        assert_eq!(decoded, record);

        // Re-encoding the decoded record produces the same bytes.
        assert_eq!(encode(&schema, &decoded).unwrap(), buf);
    }
}

#[test]
fn test_decode_is_deterministic() {
    let schema = test_schema();
    let decoder = Decoder::new(&schema);
    let mut rng = fastrand::Rng::with_seed(99);

    for _ in 0..ITERATIONS {
        let record = random_record(&mut rng, &schema, "Item", 0);
        let buf = encode(&schema, &record).unwrap();
        let first = decoder.decode("Item", &buf);
        let second = decoder.decode("Item", &buf);
        assert_eq!(first, second);
    }
}

#[test]
fn test_unknown_fields_are_ignored() {
    let schema = test_schema();
    let mut rng = fastrand::Rng::with_seed(7);

    for _ in 0..ITERATIONS {
        let record = random_record(&mut rng, &schema, "Item", 0);
        let unknown = WireBuilder::new()
            .varint(rng.u32(500..1000), rng.u64(..))
            .fixed32(rng.u32(1000..2000), rng.u32(..))
            .fixed64(rng.u32(2000..3000), rng.u64(..))
            .string(rng.u32(3000..4000), "unknown")
            .message(4000, WireBuilder::new().varint(1, 1).varint(999, 2))
            .finish();

        let mut buf = unknown.clone();
        buf.extend(encode(&schema, &record).unwrap());
        buf.extend(&unknown);

        assert_eq!(decode(&schema, "Item", &buf).unwrap(), record);
    }
}

#[test]
fn test_truncated_input() {
    let schema = test_schema();
    let mut rng = fastrand::Rng::with_seed(42);

    for _ in 0..ITERATIONS / 4 {
        let record = random_record(&mut rng, &schema, "Item", 0);
        let buf = encode(&schema, &record).unwrap();
        for len in 0..buf.len() {
            // A prefix which ends on a field boundary decodes to the fields
            // before that boundary. Any other prefix is truncated input.
            match decode(&schema, "Item", &buf[..len]) {
                Ok(prefix) => assert_eq!(encode(&schema, &prefix).unwrap(), &buf[..len]),
                Err(err) => assert_eq!(err.kind(), &ErrorKind::TruncatedInput),
            }
        }

        // Cutting the last byte always splits a tag or value.
        if !buf.is_empty() {
            assert!(decode(&schema, "Item", &buf[..buf.len() - 1]).is_err());
        }
    }
}

#[test]
fn test_random_bytes_never_panic() {
    let schema = test_schema();
    let mut rng = fastrand::Rng::with_seed(5);

    for _ in 0..ITERATIONS * 10 {
        let len = rng.usize(0..64);
        let buf: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
        let _ = decode(&schema, "Item", &buf);
    }
}

#[test]
fn test_varint_round_trip() {
    let mut rng = fastrand::Rng::with_seed(3);

    for _ in 0..ITERATIONS * 10 {
        // Bias towards small values, which exercise short encodings.
        let val = rng.u64(..) >> rng.u32(0..64);
        let mut buf = Vec::new();
        encode_varint(val, &mut buf);
        assert_eq!(buf.len(), varint_len(val));
        assert_eq!(decode_varint(&buf), Ok((val, buf.len())));
    }
}
