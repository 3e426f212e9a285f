use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::wire::WireType;

/// Errors decoding a message.
///
/// Every error is fatal to the decode call that produced it. The error
/// records the byte offset in the top-level buffer at which the problem was
/// detected and, where known, the field number and message type.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeError {
    kind: ErrorKind,
    offset: usize,
    field: Option<u32>,
    message: Option<String>,
}

impl DecodeError {
    pub fn new(kind: ErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            field: None,
            message: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Return the offset from the start of the input at which the error was
    /// detected.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Return the field number associated with this error.
    pub fn field(&self) -> Option<u32> {
        self.field
    }

    /// Return the name of the message type being decoded when the error
    /// occurred.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Record the message type and field number at which the error occurred,
    /// unless an embedded message already did.
    ///
    /// Both are set together, so the field number always belongs to the
    /// reported message. `field` is `None` for errors that are not tied to a
    /// field, such as a malformed tag.
    pub(crate) fn with_context(mut self, field: Option<u32>, message: &str) -> Self {
        if self.message.is_none() {
            self.field = field;
            self.message = Some(message.to_string());
        }
        self
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "error")?;
        if let Some(message) = &self.message {
            write!(f, " in message {}", message)?;
        }
        if let Some(field) = self.field {
            write!(f, " field {}", field)?;
        }
        write!(f, " at offset {}: {}", self.offset, self.kind)
    }
}

impl Error for DecodeError {}

/// Enum describing the kind of a [`DecodeError`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input ended in the middle of a tag or value.
    TruncatedInput,

    /// A varint was longer than 10 bytes or encoded more than 64 bits.
    VarintOverflow,

    /// A tag used a wire type other than varint, fixed64, length-delimited
    /// or fixed32.
    ///
    /// Wire types are stored in 3 bits. The deprecated group types (3, 4) and
    /// the unused values (6, 7) are all rejected.
    InvalidWireType(u8),

    /// A tag had a field number of zero or one that is too large.
    InvalidFieldNumber(u64),

    /// A known field was encoded with a wire type that its schema type does
    /// not accept.
    WireTypeMismatch {
        expected: WireType,
        actual: WireType,
    },

    /// A packed run of fixed-width values has a length that is not a
    /// multiple of the element size.
    PackedLengthMismatch { len: usize, element_size: usize },

    /// A string field contained invalid UTF-8.
    InvalidUtf8,

    /// Embedded messages were nested more deeply than the configured limit.
    RecursionLimitExceeded(usize),

    /// The requested message type does not exist in the schema.
    UnknownMessage(String),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::TruncatedInput => write!(f, "truncated input"),
            ErrorKind::VarintOverflow => write!(f, "varint overflows 64 bits"),
            ErrorKind::InvalidWireType(wt) => write!(f, "invalid wire type {}", wt),
            ErrorKind::InvalidFieldNumber(n) => write!(f, "invalid field number {}", n),
            ErrorKind::WireTypeMismatch { expected, actual } => {
                write!(f, "wire type mismatch: expected {}, got {}", expected, actual)
            }
            ErrorKind::PackedLengthMismatch { len, element_size } => write!(
                f,
                "packed field length {} is not a multiple of {}",
                len, element_size
            ),
            ErrorKind::InvalidUtf8 => write!(f, "invalid UTF-8 in string"),
            ErrorKind::RecursionLimitExceeded(limit) => {
                write!(f, "message nesting exceeds limit of {}", limit)
            }
            ErrorKind::UnknownMessage(name) => write!(f, "unknown message type \"{}\"", name),
        }
    }
}

/// Errors constructing a [`Schema`](crate::Schema).
#[derive(Debug)]
#[non_exhaustive]
pub enum SchemaError {
    /// Two messages have the same name.
    DuplicateMessage(String),

    /// Two fields of a message use the same number.
    DuplicateFieldNumber { message: String, number: u32 },

    /// Two fields of a message use the same name.
    DuplicateFieldName { message: String, name: String },

    /// A field number is zero or above the maximum field number.
    InvalidFieldNumber { message: String, number: u32 },

    /// A field refers to a message type which is not defined.
    UnknownMessage { message: String, field: String, target: String },

    /// A map field uses a key type which cannot be used as a map key.
    InvalidMapKey { message: String, field: String },

    /// A field definition is incomplete or inconsistent.
    InvalidField { message: String, field: String, reason: &'static str },

    /// The JSON schema document could not be parsed.
    Json(serde_json::Error),

    /// A binary descriptor set could not be decoded.
    Descriptor(DecodeError),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateMessage(name) => write!(f, "duplicate message \"{}\"", name),
            Self::DuplicateFieldNumber { message, number } => {
                write!(f, "duplicate field number {} in message \"{}\"", number, message)
            }
            Self::DuplicateFieldName { message, name } => {
                write!(f, "duplicate field name \"{}\" in message \"{}\"", name, message)
            }
            Self::InvalidFieldNumber { message, number } => {
                write!(f, "invalid field number {} in message \"{}\"", number, message)
            }
            Self::UnknownMessage {
                message,
                field,
                target,
            } => write!(
                f,
                "field \"{}.{}\" refers to unknown message \"{}\"",
                message, field, target
            ),
            Self::InvalidMapKey { message, field } => {
                write!(f, "invalid key type for map field \"{}.{}\"", message, field)
            }
            Self::InvalidField {
                message,
                field,
                reason,
            } => write!(f, "invalid field \"{}.{}\": {}", message, field, reason),
            Self::Json(err) => write!(f, "failed to parse schema: {}", err),
            Self::Descriptor(err) => write!(f, "failed to decode descriptor set: {}", err),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Descriptor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(val: serde_json::Error) -> Self {
        Self::Json(val)
    }
}

impl From<DecodeError> for SchemaError {
    fn from(val: DecodeError) -> Self {
        Self::Descriptor(val)
    }
}

/// Errors encoding a [`Record`](crate::Record).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum EncodeError {
    /// A record does not have a field with the given name.
    UnknownField { message: String, field: String },

    /// A value does not match the declared type of its field.
    TypeMismatch { message: String, field: String },

    /// A record stored in an `any` field has a message type which is not in
    /// the schema.
    UnknownMessage(String),

    /// An embedded record is of a different message type than the field
    /// declares.
    MessageMismatch {
        field: String,
        expected: String,
        actual: String,
    },
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField { message, field } => {
                write!(f, "message \"{}\" has no field \"{}\"", message, field)
            }
            Self::TypeMismatch { message, field } => {
                write!(f, "value for \"{}.{}\" has the wrong type", message, field)
            }
            Self::UnknownMessage(name) => write!(f, "unknown message type \"{}\"", name),
            Self::MessageMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field \"{}\" expects message \"{}\" but got \"{}\"",
                field, expected, actual
            ),
        }
    }
}

impl Error for EncodeError {}

#[cfg(test)]
mod tests {
    use super::{DecodeError, ErrorKind};
    use crate::wire::WireType;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::new(
            ErrorKind::WireTypeMismatch {
                expected: WireType::Varint,
                actual: WireType::Fixed32,
            },
            12,
        )
        .with_context(Some(3), "User");
        assert_eq!(
            err.to_string(),
            "error in message User field 3 at offset 12: wire type mismatch: expected varint, got fixed32"
        );

        let err = DecodeError::new(ErrorKind::TruncatedInput, 4);
        assert_eq!(err.to_string(), "error at offset 4: truncated input");
    }

    #[test]
    fn test_context_keeps_innermost() {
        let err = DecodeError::new(ErrorKind::InvalidUtf8, 7)
            .with_context(Some(2), "Profile")
            .with_context(Some(5), "User");
        assert_eq!(err.field(), Some(2));
        assert_eq!(err.message(), Some("Profile"));

        // A tag error in an embedded message has no field. The outer field
        // must not be attributed to the inner message.
        let err = DecodeError::new(ErrorKind::TruncatedInput, 2)
            .with_context(None, "Profile")
            .with_context(Some(4), "User");
        assert_eq!(err.field(), None);
        assert_eq!(err.message(), Some("Profile"));
        assert_eq!(err.to_string(), "error in message Profile at offset 2: truncated input");
    }
}
