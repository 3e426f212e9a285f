//! Decoded messages.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::errors::EncodeError;
use crate::schema::{FieldDescriptor, MessageDescriptor};

/// Value of a field in a [`Record`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),

    /// Numeric value of an enum field. Values not known to the schema are
    /// preserved.
    Enum(i32),

    String(String),
    Bytes(Vec<u8>),
    Message(Record),

    /// Elements of a repeated field, in wire order.
    List(Vec<Value>),

    /// Entries of a map field.
    Map(BTreeMap<MapKey, Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the value of a signed integer or enum field.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I32(x) | Self::Enum(x) => Some(*x as i64),
            Self::I64(x) => Some(*x),
            _ => None,
        }
    }

    /// Return the value of an unsigned integer field.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U32(x) => Some(*x as u64),
            Self::U64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(x) => Some(*x as f64),
            Self::F64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Record> {
        match self {
            Self::Message(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Self::Bool(val)
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Self::I32(val)
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Self::I64(val)
    }
}

impl From<u32> for Value {
    fn from(val: u32) -> Self {
        Self::U32(val)
    }
}

impl From<u64> for Value {
    fn from(val: u64) -> Self {
        Self::U64(val)
    }
}

impl From<f32> for Value {
    fn from(val: f32) -> Self {
        Self::F32(val)
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Self::F64(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Self::String(val.to_string())
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Self::String(val)
    }
}

impl From<Vec<u8>> for Value {
    fn from(val: Vec<u8>) -> Self {
        Self::Bytes(val)
    }
}

impl From<Record> for Value {
    fn from(val: Record) -> Self {
        Self::Message(val)
    }
}

/// Key of a map field entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl MapKey {
    /// Convert a field value into a map key. Returns `None` if the value's
    /// type cannot be used as a key.
    pub fn from_value(value: Value) -> Option<MapKey> {
        let key = match value {
            Value::Bool(x) => Self::Bool(x),
            Value::I32(x) => Self::I32(x),
            Value::I64(x) => Self::I64(x),
            Value::U32(x) => Self::U32(x),
            Value::U64(x) => Self::U64(x),
            Value::String(x) => Self::String(x),
            _ => return None,
        };
        Some(key)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(x) => Value::Bool(*x),
            Self::I32(x) => Value::I32(*x),
            Self::I64(x) => Value::I64(*x),
            Self::U32(x) => Value::U32(*x),
            Self::U64(x) => Value::U64(*x),
            Self::String(x) => Value::String(x.clone()),
        }
    }
}

impl Display for MapKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(x) => write!(f, "{}", x),
            Self::I32(x) => write!(f, "{}", x),
            Self::I64(x) => write!(f, "{}", x),
            Self::U32(x) => write!(f, "{}", x),
            Self::U64(x) => write!(f, "{}", x),
            Self::String(x) => write!(f, "{}", x),
        }
    }
}

/// An instance of a message type.
///
/// A record holds one optional value per field of its message type. Repeated
/// and map fields always have a value, which is empty if the field did not
/// occur in the input.
#[derive(Clone, Debug)]
pub struct Record {
    descriptor: Arc<MessageDescriptor>,
    values: Vec<Option<Value>>,
}

impl Record {
    /// Create an empty record for a message type.
    pub fn new(descriptor: Arc<MessageDescriptor>) -> Self {
        let values = descriptor
            .fields()
            .iter()
            .map(|field| {
                if field.is_repeated() || field.is_map() {
                    field.default_value()
                } else {
                    None
                }
            })
            .collect();
        Self { descriptor, values }
    }

    pub fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    /// Return the name of this record's message type.
    pub fn message_name(&self) -> &str {
        self.descriptor.name()
    }

    /// Return the value of a field, or `None` if it is absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let (index, _) = self.descriptor.field_by_name(name)?;
        self.values[index].as_ref()
    }

    /// Return the value of a field, or `None` if it is absent.
    pub fn get_by_number(&self, number: u32) -> Option<&Value> {
        let (index, _) = self.descriptor.field_by_number(number)?;
        self.values[index].as_ref()
    }

    /// Set the value of a field, returning the previous value.
    ///
    /// The value is not checked against the field's type here. Mismatches
    /// are reported when the record is [encoded](crate::encode).
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<Option<Value>, EncodeError> {
        let (index, _) = self.descriptor.field_by_name(name).ok_or_else(|| {
            EncodeError::UnknownField {
                message: self.descriptor.name().to_string(),
                field: name.to_string(),
            }
        })?;
        Ok(self.values[index].replace(value.into()))
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, EncodeError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Remove the value of a field, returning it.
    pub fn clear(&mut self, name: &str) -> Option<Value> {
        let (index, field) = self.descriptor.field_by_name(name)?;
        if field.is_repeated() || field.is_map() {
            std::mem::replace(&mut self.values[index], field.default_value())
        } else {
            self.values[index].take()
        }
    }

    /// Iterate over the fields which have a value, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.descriptor
            .fields()
            .iter()
            .zip(&self.values)
            .filter_map(|(field, value)| value.as_ref().map(|v| (field, v)))
    }

    /// Set the value of the field at `index`, replacing any earlier value.
    pub(crate) fn set_at(&mut self, index: usize, value: Value) {
        self.values[index] = Some(value);
    }

    /// Append an element to the repeated field at `index`.
    pub(crate) fn push_at(&mut self, index: usize, value: Value) {
        match &mut self.values[index] {
            Some(Value::List(items)) => items.push(value),
            slot => *slot = Some(Value::List(vec![value])),
        }
    }

    /// Insert an entry into the map field at `index`, replacing any earlier
    /// entry with the same key.
    pub(crate) fn insert_at(&mut self, index: usize, key: MapKey, value: Value) {
        match &mut self.values[index] {
            Some(Value::Map(entries)) => {
                entries.insert(key, value);
            }
            slot => *slot = Some(Value::Map(BTreeMap::from([(key, value)]))),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.name() == other.descriptor.name() && self.values == other.values
    }
}
